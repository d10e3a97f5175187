pub mod approved_payments;
pub mod partner_transfers;
pub mod partner_venues;
pub mod pending_payments;

pub mod partner_venues;
pub mod payment_store;

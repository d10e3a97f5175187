pub mod partner_venues;
pub mod payment_store;
pub mod slip_storage;

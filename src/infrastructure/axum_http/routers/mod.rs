pub mod admin_payments;
pub mod partner_transfers;
pub mod payment_webhooks;
pub mod payments;
pub mod store_health;

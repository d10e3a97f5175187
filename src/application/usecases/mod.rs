pub mod partner_transfers;
pub mod payment_approvals;
pub mod payment_sessions;
pub mod payment_webhooks;

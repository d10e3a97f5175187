pub mod countdown;
pub mod enums;
pub mod iam;
pub mod money;
pub mod partner_venues;
pub mod payment_methods;
pub mod payment_sessions;
pub mod payment_webhooks;
pub mod promptpay;
pub mod revenue_split;
pub mod settlements;
pub mod slips;

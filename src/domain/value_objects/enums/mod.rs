pub mod booking_types;
pub mod payment_methods;
pub mod payment_session_statuses;
pub mod transfer_statuses;

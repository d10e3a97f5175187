use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::{
    enums::payment_session_statuses::PaymentSessionStatus, promptpay::validator::PayloadField,
};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid payee identifier: {0}")]
    InvalidIdentifier(String),
    #[error("invalid slip: {0}")]
    InvalidSlip(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed webhook payload: {0}")]
    MalformedWebhook(String),
    #[error("payment payload failed validation on: {}", join_fields(.0))]
    ValidationFailure(Vec<PayloadField>),
    #[error("payment session {0} has expired")]
    ExpiredSession(String),
    #[error("payment session {0} not found")]
    SessionNotFound(String),
    #[error("cannot {action} a payment session in status {status}")]
    InvalidTransition {
        action: &'static str,
        status: PaymentSessionStatus,
    },
    #[error("transfer {0} not found")]
    TransferNotFound(Uuid),
    #[error("transfer blocked: {0}")]
    TransferBlocked(String),
    #[error("forbidden")]
    Forbidden,
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentError::InvalidAmount(_)
            | PaymentError::InvalidIdentifier(_)
            | PaymentError::InvalidSlip(_)
            | PaymentError::MalformedWebhook(_) => StatusCode::BAD_REQUEST,
            PaymentError::InvalidSignature => StatusCode::UNAUTHORIZED,
            PaymentError::Forbidden => StatusCode::FORBIDDEN,
            PaymentError::SessionNotFound(_) | PaymentError::TransferNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            PaymentError::InvalidTransition { .. } | PaymentError::TransferBlocked(_) => {
                StatusCode::CONFLICT
            }
            PaymentError::ExpiredSession(_) => StatusCode::GONE,
            PaymentError::ValidationFailure(_)
            | PaymentError::PersistenceFailure(_)
            | PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn join_fields(fields: &[PayloadField]) -> String {
    fields
        .iter()
        .map(PayloadField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type PaymentResult<T> = std::result::Result<T, PaymentError>;

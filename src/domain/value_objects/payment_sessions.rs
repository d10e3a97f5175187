use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    errors::PaymentError,
    value_objects::{
        countdown::{self, CountdownTick},
        enums::{
            booking_types::BookingType, payment_methods::PaymentMethod,
            payment_session_statuses::PaymentSessionStatus,
        },
        promptpay::validator::ValidatedPayload,
        slips::SlipReference,
    },
};

pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 15 * 60;

use PaymentSessionStatus::*;

const ATTACH_SLIP_ACTION: &str = "attach a slip to";

/// One attempt to pay a booking through a PromptPay QR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub transaction_id: String,
    pub user_id: Uuid,
    pub venue_id: Uuid,
    pub booking_type: BookingType,
    pub description: String,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub payee_identifier: String,
    pub payload: String,
    pub status: PaymentSessionStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub slip: Option<SlipReference>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub rejected_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A booking's request for a QR payment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentModel {
    pub venue_id: Uuid,
    pub booking_type: BookingType,
    pub description: String,
    /// Baht, as text or a JSON number.
    #[serde(deserialize_with = "amount_text")]
    pub amount: String,
}

fn amount_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => Ok(text),
        serde_json::Value::Number(number) => Ok(number.to_string()),
        other => Err(D::Error::custom(format!(
            "amount must be a string or a number, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct OpenPaymentSession {
    pub user_id: Uuid,
    pub venue_id: Uuid,
    pub booking_type: BookingType,
    pub description: String,
    pub amount: Decimal,
    pub payee_identifier: String,
    pub payload: ValidatedPayload,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    AttachSlip(SlipReference),
    SubmitForApproval,
    Approve { by: String },
    Reject { by: String, reason: Option<String> },
    Expire,
    Cancel,
}

impl SessionChange {
    pub fn action(&self) -> &'static str {
        match self {
            SessionChange::AttachSlip(_) => ATTACH_SLIP_ACTION,
            SessionChange::SubmitForApproval => "submit",
            SessionChange::Approve { .. } => "approve",
            SessionChange::Reject { .. } => "reject",
            SessionChange::Expire => "expire",
            SessionChange::Cancel => "cancel",
        }
    }

    /// Statuses a conditional write must observe for this change to apply.
    pub fn allowed_from(&self) -> &'static [PaymentSessionStatus] {
        match self {
            SessionChange::AttachSlip(_) => &[Pending],
            SessionChange::SubmitForApproval => &[SlipUploaded],
            SessionChange::Approve { .. } | SessionChange::Reject { .. } => &[PendingApproval],
            SessionChange::Expire => &[Pending],
            SessionChange::Cancel => &[Pending, SlipUploaded],
        }
    }

    pub fn target(&self) -> PaymentSessionStatus {
        match self {
            SessionChange::AttachSlip(_) => SlipUploaded,
            SessionChange::SubmitForApproval => PendingApproval,
            SessionChange::Approve { .. } => Approved,
            SessionChange::Reject { .. } => Rejected,
            SessionChange::Expire => Expired,
            SessionChange::Cancel => Cancelled,
        }
    }
}

/// Result of a conditional write against a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(PaymentSession),
    /// The stored status did not allow the change; carries what is stored.
    Conflict(PaymentSession),
    NotFound,
}

impl PaymentSession {
    pub fn open(request: OpenPaymentSession, now: DateTime<Utc>) -> Self {
        Self {
            transaction_id: generate_transaction_id(),
            user_id: request.user_id,
            venue_id: request.venue_id,
            booking_type: request.booking_type,
            description: request.description,
            method: PaymentMethod::Qr,
            amount: request.amount,
            payee_identifier: request.payee_identifier,
            payload: request.payload.into_inner(),
            status: Pending,
            created_at: now,
            expires_at: now + request.timeout,
            slip: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_reason: None,
            updated_at: now,
        }
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == Pending && now >= self.expires_at
    }

    /// Status with the timeout applied; expiry is evaluated lazily on read.
    pub fn effective_status(&self, now: DateTime<Utc>) -> PaymentSessionStatus {
        if self.is_past_expiry(now) {
            Expired
        } else {
            self.status
        }
    }

    pub fn countdown(&self, now: DateTime<Utc>) -> CountdownTick {
        countdown::tick(self.status, now, self.expires_at)
    }

    /// Checked before the slip file is stored anywhere.
    pub fn ensure_accepts_slip(&self) -> Result<(), PaymentError> {
        if self.status != Pending {
            return Err(PaymentError::InvalidTransition {
                action: ATTACH_SLIP_ACTION,
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn allows(&self, change: &SessionChange) -> bool {
        change.allowed_from().contains(&self.status)
    }

    /// Checked transition used by callers holding a snapshot.
    pub fn apply(&self, change: &SessionChange, now: DateTime<Utc>) -> Result<Self, PaymentError> {
        if !self.allows(change) {
            return Err(PaymentError::InvalidTransition {
                action: change.action(),
                status: self.status,
            });
        }
        if *change != SessionChange::Expire && self.is_past_expiry(now) {
            return Err(PaymentError::ExpiredSession(self.transaction_id.clone()));
        }
        let mut next = self.clone();
        next.mutate(change, now);
        Ok(next)
    }

    /// Writes the change's fields without any status check. Stores call this
    /// after their own conditional check.
    pub fn mutate(&mut self, change: &SessionChange, now: DateTime<Utc>) {
        match change {
            SessionChange::AttachSlip(slip) => self.slip = Some(slip.clone()),
            SessionChange::Approve { by } => {
                self.approved_by = Some(by.clone());
                self.approved_at = Some(now);
            }
            SessionChange::Reject { by, reason } => {
                self.rejected_by = Some(by.clone());
                self.rejected_reason = reason.clone();
            }
            SessionChange::SubmitForApproval | SessionChange::Expire | SessionChange::Cancel => {}
        }
        self.status = change.target();
        self.updated_at = now;
    }

    /// Changes that carry `behind` forward to this copy's state, in order.
    /// Empty when `behind` already matches, is terminal, or sits past this
    /// copy on the lifecycle.
    pub fn changes_since(&self, behind: &PaymentSession) -> Vec<SessionChange> {
        if behind.status == self.status || behind.status.is_terminal() {
            return Vec::new();
        }

        let mut changes = Vec::new();
        if behind.status == Pending {
            if let Some(slip) = &self.slip {
                changes.push(SessionChange::AttachSlip(slip.clone()));
            }
        }
        let reached_review = matches!(self.status, PendingApproval | Approved | Rejected);
        if reached_review && behind.status != PendingApproval {
            changes.push(SessionChange::SubmitForApproval);
        }
        match self.status {
            Approved => changes.push(SessionChange::Approve {
                by: self.approved_by.clone().unwrap_or_default(),
            }),
            Rejected => changes.push(SessionChange::Reject {
                by: self.rejected_by.clone().unwrap_or_default(),
                reason: self.rejected_reason.clone(),
            }),
            Expired => changes.push(SessionChange::Expire),
            Cancelled => changes.push(SessionChange::Cancel),
            Pending | SlipUploaded | PendingApproval => {}
        }
        changes
    }
}

pub const CURRENCY_CODE: &str = "THB";

/// What the booking screen and the admin queue see of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSessionDto {
    pub transaction_id: String,
    pub user_id: Uuid,
    pub venue_id: Uuid,
    pub booking_type: BookingType,
    pub description: String,
    pub amount: String,
    pub currency: &'static str,
    pub payload: String,
    pub status: PaymentSessionStatus,
    pub countdown: CountdownTick,
    pub expires_at: DateTime<Utc>,
    pub slip: Option<SlipReference>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentSessionDto {
    pub fn from_session(session: &PaymentSession, now: DateTime<Utc>) -> Self {
        Self {
            transaction_id: session.transaction_id.clone(),
            user_id: session.user_id,
            venue_id: session.venue_id,
            booking_type: session.booking_type,
            description: session.description.clone(),
            amount: format!("{:.2}", session.amount),
            currency: CURRENCY_CODE,
            payload: session.payload.clone(),
            status: session.effective_status(now),
            countdown: session.countdown(now),
            expires_at: session.expires_at,
            slip: session.slip.clone(),
            approved_by: session.approved_by.clone(),
            approved_at: session.approved_at,
            rejected_reason: session.rejected_reason.clone(),
            created_at: session.created_at,
        }
    }
}

pub fn generate_transaction_id() -> String {
    format!("TXN-{}", Uuid::new_v4().simple().to_string().to_uppercase())
}

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::{
            booking_types::BookingType, payment_methods::PaymentMethod,
            payment_session_statuses::PaymentSessionStatus,
        },
        money::{from_minor, to_minor},
        payment_sessions::PaymentSession,
        slips::SlipReference,
    },
    infrastructure::postgres::schema::pending_payments,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Insertable)]
#[diesel(table_name = pending_payments)]
#[diesel(primary_key(transaction_id))]
pub struct PendingPaymentEntity {
    pub transaction_id: String,
    pub user_id: Uuid,
    pub venue_id: Uuid,
    pub booking_type: String,
    pub description: String,
    pub method: String,
    pub amount_minor: i64,
    pub payee_identifier: String,
    pub payload: String,
    pub status: String,
    pub slip_url: Option<String>,
    pub slip_filename: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub rejected_reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns a state transition may touch.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = pending_payments)]
#[diesel(treat_none_as_null = true)]
pub struct PendingPaymentChangeset {
    pub status: String,
    pub slip_url: Option<String>,
    pub slip_filename: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub rejected_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&PaymentSession> for PendingPaymentEntity {
    type Error = anyhow::Error;

    fn try_from(session: &PaymentSession) -> Result<Self> {
        Ok(Self {
            transaction_id: session.transaction_id.clone(),
            user_id: session.user_id,
            venue_id: session.venue_id,
            booking_type: session.booking_type.to_string(),
            description: session.description.clone(),
            method: session.method.to_string(),
            amount_minor: to_minor(session.amount)?,
            payee_identifier: session.payee_identifier.clone(),
            payload: session.payload.clone(),
            status: session.status.to_string(),
            slip_url: session.slip.as_ref().map(|slip| slip.url.clone()),
            slip_filename: session.slip.as_ref().map(|slip| slip.filename.clone()),
            approved_by: session.approved_by.clone(),
            approved_at: session.approved_at,
            rejected_by: session.rejected_by.clone(),
            rejected_reason: session.rejected_reason.clone(),
            expires_at: session.expires_at,
            created_at: session.created_at,
            updated_at: session.updated_at,
        })
    }
}

impl From<&PaymentSession> for PendingPaymentChangeset {
    fn from(session: &PaymentSession) -> Self {
        Self {
            status: session.status.to_string(),
            slip_url: session.slip.as_ref().map(|slip| slip.url.clone()),
            slip_filename: session.slip.as_ref().map(|slip| slip.filename.clone()),
            approved_by: session.approved_by.clone(),
            approved_at: session.approved_at,
            rejected_by: session.rejected_by.clone(),
            rejected_reason: session.rejected_reason.clone(),
            updated_at: session.updated_at,
        }
    }
}

impl TryFrom<PendingPaymentEntity> for PaymentSession {
    type Error = anyhow::Error;

    fn try_from(row: PendingPaymentEntity) -> Result<Self> {
        let status = PaymentSessionStatus::from_str(&row.status)
            .ok_or_else(|| anyhow!("unknown payment status `{}`", row.status))?;
        let booking_type = BookingType::from_str(&row.booking_type)
            .ok_or_else(|| anyhow!("unknown booking type `{}`", row.booking_type))?;
        let method = PaymentMethod::from_str(&row.method)
            .ok_or_else(|| anyhow!("unknown payment method `{}`", row.method))?;
        let slip = match (row.slip_url, row.slip_filename) {
            (Some(url), filename) => Some(SlipReference {
                url,
                filename: filename.unwrap_or_default(),
            }),
            (None, _) => None,
        };

        Ok(PaymentSession {
            transaction_id: row.transaction_id,
            user_id: row.user_id,
            venue_id: row.venue_id,
            booking_type,
            description: row.description,
            method,
            amount: from_minor(row.amount_minor),
            payee_identifier: row.payee_identifier,
            payload: row.payload,
            status,
            created_at: row.created_at,
            expires_at: row.expires_at,
            slip,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejected_by: row.rejected_by,
            rejected_reason: row.rejected_reason,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::payment_sessions::fixtures::awaiting_approval;
    use rust_decimal::Decimal;

    #[test]
    fn row_keeps_every_session_field() {
        let session = awaiting_approval(Decimal::new(123450, 2), Utc::now());
        let row = PendingPaymentEntity::try_from(&session).unwrap();
        assert_eq!(row.amount_minor, 123450);
        assert_eq!(row.status, "pending_approval");

        let restored = PaymentSession::try_from(row).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn unknown_status_is_an_error() {
        let session = awaiting_approval(Decimal::ONE, Utc::now());
        let mut row = PendingPaymentEntity::try_from(&session).unwrap();
        row.status = "refunded".to_string();
        assert!(PaymentSession::try_from(row).is_err());
    }
}

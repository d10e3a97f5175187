use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{
    enums::{
        booking_types::BookingType, payment_methods::PaymentMethod,
        transfer_statuses::TransferStatus,
    },
    revenue_split::RevenueSplit,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: Uuid,
    pub partner_venue_id: Uuid,
    /// The approved session's transaction id.
    pub payment_id: String,
    pub total_amount: Decimal,
    pub partner_amount: Decimal,
    pub system_amount: Decimal,
    pub status: TransferStatus,
    pub transfer_reference: Option<String>,
    pub requires_venue_details: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedPayment {
    pub transaction_id: String,
    pub user_id: Uuid,
    pub partner_venue_id: Uuid,
    pub description: String,
    pub slip_url: Option<String>,
    pub booking_type: BookingType,
    pub method: PaymentMethod,
    pub fitness_name: String,
    pub partner_name: String,
    pub split: RevenueSplit,
    /// Informational; the split never deducts it.
    pub processing_fee: Decimal,
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
}

impl ApprovedPayment {
    pub fn system_fee(&self) -> Decimal {
        self.split.system_amount
    }

    pub fn partner_revenue(&self) -> Decimal {
        self.split.partner_amount
    }
}

/// Everything written once per approved session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub approved: ApprovedPayment,
    pub transfer: TransferRecord,
}

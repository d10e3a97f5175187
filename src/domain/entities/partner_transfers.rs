use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::transfer_statuses::TransferStatus,
        money::{from_minor, to_minor},
        settlements::TransferRecord,
    },
    infrastructure::postgres::schema::partner_transfers,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Insertable)]
#[diesel(table_name = partner_transfers)]
pub struct PartnerTransferEntity {
    pub id: Uuid,
    pub partner_venue_id: Uuid,
    pub payment_id: String,
    pub total_amount_minor: i64,
    pub partner_amount_minor: i64,
    pub system_amount_minor: i64,
    pub status: String,
    pub transfer_reference: Option<String>,
    pub requires_venue_details: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&TransferRecord> for PartnerTransferEntity {
    type Error = anyhow::Error;

    fn try_from(transfer: &TransferRecord) -> Result<Self> {
        Ok(Self {
            id: transfer.id,
            partner_venue_id: transfer.partner_venue_id,
            payment_id: transfer.payment_id.clone(),
            total_amount_minor: to_minor(transfer.total_amount)?,
            partner_amount_minor: to_minor(transfer.partner_amount)?,
            system_amount_minor: to_minor(transfer.system_amount)?,
            status: transfer.status.to_string(),
            transfer_reference: transfer.transfer_reference.clone(),
            requires_venue_details: transfer.requires_venue_details,
            created_at: transfer.created_at,
            updated_at: transfer.updated_at,
        })
    }
}

impl TryFrom<PartnerTransferEntity> for TransferRecord {
    type Error = anyhow::Error;

    fn try_from(row: PartnerTransferEntity) -> Result<Self> {
        Ok(TransferRecord {
            status: TransferStatus::from_str(&row.status)
                .ok_or_else(|| anyhow!("unknown transfer status `{}`", row.status))?,
            id: row.id,
            partner_venue_id: row.partner_venue_id,
            payment_id: row.payment_id,
            total_amount: from_minor(row.total_amount_minor),
            partner_amount: from_minor(row.partner_amount_minor),
            system_amount: from_minor(row.system_amount_minor),
            transfer_reference: row.transfer_reference,
            requires_venue_details: row.requires_venue_details,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

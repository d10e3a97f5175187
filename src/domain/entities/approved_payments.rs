use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::{booking_types::BookingType, payment_methods::PaymentMethod},
        money::{from_basis_points, from_minor, to_basis_points, to_minor},
        revenue_split::RevenueSplit,
        settlements::ApprovedPayment,
    },
    infrastructure::postgres::schema::approved_payments,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Insertable)]
#[diesel(table_name = approved_payments)]
#[diesel(primary_key(transaction_id))]
pub struct ApprovedPaymentEntity {
    pub transaction_id: String,
    pub user_id: Uuid,
    pub partner_venue_id: Uuid,
    pub description: String,
    pub slip_url: Option<String>,
    pub booking_type: String,
    pub method: String,
    pub fitness_name: String,
    pub partner_name: String,
    pub total_amount_minor: i64,
    pub partner_amount_minor: i64,
    pub system_amount_minor: i64,
    pub split_basis_points: i32,
    pub processing_fee_minor: i64,
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
}

impl TryFrom<&ApprovedPayment> for ApprovedPaymentEntity {
    type Error = anyhow::Error;

    fn try_from(approved: &ApprovedPayment) -> Result<Self> {
        Ok(Self {
            transaction_id: approved.transaction_id.clone(),
            user_id: approved.user_id,
            partner_venue_id: approved.partner_venue_id,
            description: approved.description.clone(),
            slip_url: approved.slip_url.clone(),
            booking_type: approved.booking_type.to_string(),
            method: approved.method.to_string(),
            fitness_name: approved.fitness_name.clone(),
            partner_name: approved.partner_name.clone(),
            total_amount_minor: to_minor(approved.split.total_amount)?,
            partner_amount_minor: to_minor(approved.split.partner_amount)?,
            system_amount_minor: to_minor(approved.split.system_amount)?,
            split_basis_points: to_basis_points(approved.split.split_percentage)?,
            processing_fee_minor: to_minor(approved.processing_fee)?,
            approved_by: approved.approved_by.clone(),
            approved_at: approved.approved_at,
        })
    }
}

impl TryFrom<ApprovedPaymentEntity> for ApprovedPayment {
    type Error = anyhow::Error;

    fn try_from(row: ApprovedPaymentEntity) -> Result<Self> {
        Ok(ApprovedPayment {
            booking_type: BookingType::from_str(&row.booking_type)
                .ok_or_else(|| anyhow!("unknown booking type `{}`", row.booking_type))?,
            method: PaymentMethod::from_str(&row.method)
                .ok_or_else(|| anyhow!("unknown payment method `{}`", row.method))?,
            transaction_id: row.transaction_id,
            user_id: row.user_id,
            partner_venue_id: row.partner_venue_id,
            description: row.description,
            slip_url: row.slip_url,
            fitness_name: row.fitness_name,
            partner_name: row.partner_name,
            split: RevenueSplit {
                total_amount: from_minor(row.total_amount_minor),
                partner_amount: from_minor(row.partner_amount_minor),
                system_amount: from_minor(row.system_amount_minor),
                split_percentage: from_basis_points(row.split_basis_points),
            },
            processing_fee: from_minor(row.processing_fee_minor),
            approved_by: row.approved_by,
            approved_at: row.approved_at,
        })
    }
}

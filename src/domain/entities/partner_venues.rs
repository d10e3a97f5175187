use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        money::from_basis_points,
        partner_venues::{PartnerVenue, PayoutBankDetails},
    },
    infrastructure::postgres::schema::partner_venues,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = partner_venues)]
pub struct PartnerVenueEntity {
    pub id: Uuid,
    pub name: String,
    pub partner_name: String,
    pub split_basis_points: Option<i32>,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
}

impl From<PartnerVenueEntity> for PartnerVenue {
    fn from(row: PartnerVenueEntity) -> Self {
        let payout_bank = match (row.bank_name, row.bank_account_name, row.bank_account_number) {
            (Some(bank_name), Some(account_name), Some(account_number))
                if !account_number.trim().is_empty() =>
            {
                Some(PayoutBankDetails {
                    bank_name,
                    account_name,
                    account_number,
                })
            }
            _ => None,
        };

        PartnerVenue {
            id: row.id,
            name: row.name,
            partner_name: row.partner_name,
            split_percentage: row.split_basis_points.map(from_basis_points),
            payout_bank,
        }
    }
}

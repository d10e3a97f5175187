use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutBankDetails {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerVenue {
    pub id: Uuid,
    pub name: String,
    pub partner_name: String,
    pub split_percentage: Option<Decimal>,
    pub payout_bank: Option<PayoutBankDetails>,
}

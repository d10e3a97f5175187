use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    enums::payment_methods::PaymentMethod,
    revenue_split::{DEFAULT_SPLIT_PERCENTAGE, is_valid_percentage},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodTerms {
    pub fee_percentage: Decimal,
    pub split_percentage: Decimal,
}

impl MethodTerms {
    fn no_fee() -> Self {
        Self {
            fee_percentage: Decimal::ZERO,
            split_percentage: DEFAULT_SPLIT_PERCENTAGE,
        }
    }
}

/// Fee and split terms for every payment method, checked once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentMethodTable {
    pub qr: MethodTerms,
    pub bank_transfer: MethodTerms,
    pub card: MethodTerms,
    pub cash: MethodTerms,
}

impl Default for PaymentMethodTable {
    fn default() -> Self {
        Self {
            qr: MethodTerms::no_fee(),
            bank_transfer: MethodTerms::no_fee(),
            card: MethodTerms {
                fee_percentage: Decimal::new(365, 2),
                split_percentage: DEFAULT_SPLIT_PERCENTAGE,
            },
            cash: MethodTerms::no_fee(),
        }
    }
}

impl PaymentMethodTable {
    /// Default fees with one partner share for every method.
    pub fn with_split(split_percentage: Decimal) -> Result<Self> {
        let mut table = Self::default();
        for terms in [
            &mut table.qr,
            &mut table.bank_transfer,
            &mut table.card,
            &mut table.cash,
        ] {
            terms.split_percentage = split_percentage;
        }
        table.validate()?;
        Ok(table)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let table: PaymentMethodTable =
            serde_json::from_str(raw).context("payment method table is not valid JSON")?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        for method in [
            PaymentMethod::Qr,
            PaymentMethod::BankTransfer,
            PaymentMethod::Card,
            PaymentMethod::Cash,
        ] {
            let terms = self.terms(method);
            if !is_valid_percentage(terms.fee_percentage) {
                bail!(
                    "{} fee percentage {} must be within 0..=100 with at most two decimals",
                    method,
                    terms.fee_percentage
                );
            }
            if !is_valid_percentage(terms.split_percentage) {
                bail!(
                    "{} split percentage {} must be within 0..=100 with at most two decimals",
                    method,
                    terms.split_percentage
                );
            }
        }
        Ok(())
    }

    pub fn terms(&self, method: PaymentMethod) -> &MethodTerms {
        match method {
            PaymentMethod::Qr => &self.qr,
            PaymentMethod::BankTransfer => &self.bank_transfer,
            PaymentMethod::Card => &self.card,
            PaymentMethod::Cash => &self.cash,
        }
    }
}

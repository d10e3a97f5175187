use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::errors::PaymentError;

/// 80.00%, the partner share when neither the venue nor the method sets one.
pub const DEFAULT_SPLIT_PERCENTAGE: Decimal = Decimal::from_parts(8000, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub total_amount: Decimal,
    pub partner_amount: Decimal,
    pub system_amount: Decimal,
    pub split_percentage: Decimal,
}

pub fn is_valid_percentage(percentage: Decimal) -> bool {
    percentage >= Decimal::ZERO
        && percentage <= Decimal::ONE_HUNDRED
        && percentage.normalize().scale() <= 2
}

/// Partner share is rounded to satang; the system keeps the exact remainder.
pub fn compute_split(
    total_amount: Decimal,
    split_percentage: Decimal,
) -> Result<RevenueSplit, PaymentError> {
    if total_amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(format!(
            "cannot split non-positive total {}",
            total_amount
        )));
    }
    if !is_valid_percentage(split_percentage) {
        return Err(PaymentError::Internal(anyhow::anyhow!(
            "split percentage {} is outside 0..=100",
            split_percentage
        )));
    }

    let partner_amount = (total_amount * split_percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let system_amount = total_amount - partner_amount;

    Ok(RevenueSplit {
        total_amount,
        partner_amount,
        system_amount,
        split_percentage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn eighty_percent_of_fifteen_hundred() {
        let split = compute_split(Decimal::new(150000, 2), Decimal::new(80, 0)).unwrap();
        assert_eq!(split.partner_amount, Decimal::new(120000, 2));
        assert_eq!(split.system_amount, Decimal::new(30000, 2));
        assert_eq!(split.partner_amount + split.system_amount, split.total_amount);
    }

    #[test]
    fn remainder_absorbs_rounding() {
        let split = compute_split(Decimal::new(100, 2), Decimal::new(3333, 2)).unwrap();
        assert_eq!(split.partner_amount, Decimal::new(33, 2));
        assert_eq!(split.system_amount, Decimal::new(67, 2));
    }

    #[test]
    fn default_is_eighty_percent() {
        assert_eq!(DEFAULT_SPLIT_PERCENTAGE, Decimal::new(80, 0));
    }

    #[test]
    fn rejects_out_of_range_percentage() {
        assert!(compute_split(Decimal::ONE, Decimal::new(101, 0)).is_err());
        assert!(compute_split(Decimal::ONE, Decimal::new(-1, 0)).is_err());
        assert!(compute_split(Decimal::ZERO, Decimal::new(80, 0)).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]
        #[test]
        fn partner_plus_system_equals_total(
            total_minor in 1i64..=99_999_999i64,
            basis_points in 0i64..=10_000i64,
        ) {
            let total = Decimal::new(total_minor, 2);
            let percentage = Decimal::new(basis_points, 2);
            let split = compute_split(total, percentage).unwrap();

            prop_assert_eq!(split.partner_amount + split.system_amount, total);
            prop_assert!(split.partner_amount >= Decimal::ZERO);
            prop_assert!(split.system_amount >= Decimal::ZERO);
            prop_assert!(split.partner_amount.normalize().scale() <= 2);
        }
    }
}

use anyhow::{Result, anyhow};
use rust_decimal::{Decimal, prelude::ToPrimitive};

/// Baht to satang, the unit amounts are stored in.
pub fn to_minor(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp(0)
        .to_i64()
        .ok_or_else(|| anyhow!("amount {} does not fit in minor units", amount))
}

pub fn from_minor(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// 80.00% is stored as 8000 basis points.
pub fn to_basis_points(percentage: Decimal) -> Result<i32> {
    (percentage * Decimal::ONE_HUNDRED)
        .round_dp(0)
        .to_i32()
        .ok_or_else(|| anyhow!("percentage {} does not fit in basis points", percentage))
}

pub fn from_basis_points(basis_points: i32) -> Decimal {
    Decimal::new(basis_points as i64, 2)
}

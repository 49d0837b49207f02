//! # Fixed-Point Arithmetic
//!
//! Every accrual computation in the ledger has the shape
//! `principal * multiplier / SCALE`. Both operands are `u128`, so the
//! product is formed in a 256-bit intermediate ([`U256`]) and can never
//! wrap. The quotient must fit back into `u128`; if it doesn't, the
//! operation fails with [`MathError::Overflow`] instead of truncating.
//!
//! Division floors. Each operation loses at most one unit to rounding, and
//! callers (and tests) treat `±1` as the tolerance.

use primitive_types::U256;
use thiserror::Error;

use crate::types::{Amount, Rate};

/// Fixed-point denominator: `1.0 == 10^18`.
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Errors from fixed-point operations.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum MathError {
    /// An intermediate or final value did not fit its integer width.
    #[error("arithmetic overflow in {operation}")]
    Overflow {
        /// The operation that overflowed.
        operation: &'static str,
    },

    /// A division by zero was attempted.
    #[error("division by zero")]
    DivisionByZero,
}

/// `floor(a * b / denominator)` with a 256-bit intermediate product.
///
/// # Errors
///
/// [`MathError::DivisionByZero`] if `denominator == 0`,
/// [`MathError::Overflow`] if the quotient exceeds `u128::MAX`.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }

    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(MathError::Overflow {
            operation: "mul_div product",
        })?;
    let quotient = product / U256::from(denominator);

    if quotient > U256::from(u128::MAX) {
        return Err(MathError::Overflow {
            operation: "mul_div quotient",
        });
    }
    Ok(quotient.low_u128())
}

/// `a * b / SCALE`: multiply two scaled values (or a raw amount by a scaled
/// multiplier).
pub fn scaled_mul(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, b, SCALE)
}

/// `a * SCALE / b`: divide, keeping the result at scale.
pub fn scaled_div(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, SCALE, b)
}

/// The linear growth factor for one realization window:
/// `SCALE + rate * elapsed`.
pub fn linear_multiplier(rate: Rate, elapsed_secs: u64) -> Result<u128, MathError> {
    rate.checked_mul(u128::from(elapsed_secs))
        .and_then(|interest| SCALE.checked_add(interest))
        .ok_or(MathError::Overflow {
            operation: "linear multiplier",
        })
}

/// Principal grown linearly at `rate` for `elapsed_secs`.
///
/// This is the whole accrual formula. Compounding only happens when the
/// ledger folds the result back into principal.
pub fn accrue(principal: Amount, rate: Rate, elapsed_secs: u64) -> Result<Amount, MathError> {
    if principal == 0 || rate == 0 || elapsed_secs == 0 {
        return Ok(principal);
    }
    scaled_mul(principal, linear_multiplier(rate, elapsed_secs)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_exact() {
        assert_eq!(mul_div(6, 7, 3).unwrap(), 14);
        assert_eq!(mul_div(0, u128::MAX, 1).unwrap(), 0);
    }

    #[test]
    fn mul_div_floors() {
        // 10 * 1 / 3 = 3.33.. -> 3
        assert_eq!(mul_div(10, 1, 3).unwrap(), 3);
    }

    #[test]
    fn mul_div_intermediate_does_not_wrap() {
        // u128::MAX * u128::MAX would wrap in 128 bits; the quotient fits.
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX).unwrap(), u128::MAX);
    }

    #[test]
    fn mul_div_quotient_overflow_is_loud() {
        let err = mul_div(u128::MAX, 2, 1).unwrap_err();
        assert!(matches!(err, MathError::Overflow { .. }));
    }

    #[test]
    fn division_by_zero_rejected() {
        assert_eq!(mul_div(1, 1, 0), Err(MathError::DivisionByZero));
        assert_eq!(scaled_div(1, 0), Err(MathError::DivisionByZero));
    }

    #[test]
    fn scaled_mul_and_div_are_inverse_within_one_unit() {
        let a = 123_456_789_000_000_000_000u128;
        let b = 3 * SCALE / 2;
        let product = scaled_mul(a, b).unwrap();
        let back = scaled_div(product, b).unwrap();
        assert!(a.abs_diff(back) <= 1);
    }

    #[test]
    fn linear_multiplier_matches_formula() {
        assert_eq!(linear_multiplier(0, 1_000).unwrap(), SCALE);
        assert_eq!(linear_multiplier(5, 10).unwrap(), SCALE + 50);
    }

    #[test]
    fn linear_multiplier_overflow_is_loud() {
        assert!(linear_multiplier(u128::MAX, 2).is_err());
        assert!(linear_multiplier(u128::MAX - SCALE + 1, 1).is_err());
    }

    #[test]
    fn accrue_identity_cases() {
        assert_eq!(accrue(0, 50, 100).unwrap(), 0);
        assert_eq!(accrue(1_000, 0, 100).unwrap(), 1_000);
        assert_eq!(accrue(1_000, 50, 0).unwrap(), 1_000);
    }

    #[test]
    fn accrue_hour_at_default_rate() {
        let rate = 50_000_000_000u128; // 5e-8 per second
        let grown = accrue(10_000 * SCALE, rate, 3_600).unwrap();
        // 10_000 * (1 + 5e-8 * 3600) = 10_001.8
        assert_eq!(grown, 10_001_800_000_000_000_000_000);
    }

    #[test]
    fn accrue_small_principal_rounds_down() {
        // 10_000 units at 5e-8/s for an hour: 10_000 * 1.00018 = 10_001.8 -> 10_001
        assert_eq!(accrue(10_000, 50_000_000_000, 3_600).unwrap(), 10_001);
    }
}

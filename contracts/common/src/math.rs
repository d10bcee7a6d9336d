//! Mathematical Utilities for the Tranche Vault
//!
//! Checked 18-decimal fixed-point arithmetic. Products are formed in 256
//! bits so `amount * WAD` cannot overflow before the division.

use primitive_types::U256;

use crate::constants::{precision::{BPS_DENOMINATOR, WAD}, time::SECONDS_PER_YEAR};
use crate::errors::{TrancheError, TrancheResult};

/// Compute `a * b / denominator`, rounding down
pub fn mul_div(a: u128, b: u128, denominator: u128) -> TrancheResult<u128> {
    if denominator == 0 {
        return Err(TrancheError::DivisionByZero);
    }

    // Two 128-bit factors always fit in 256 bits
    let result = U256::from(a) * U256::from(b) / U256::from(denominator);

    if result > U256::from(u128::MAX) {
        return Err(TrancheError::Overflow);
    }
    Ok(result.low_u128())
}

/// Fixed-point multiply: `a * b / 1e18`
pub fn wad_mul(a: u128, b: u128) -> TrancheResult<u128> {
    mul_div(a, b, WAD)
}

/// Fixed-point divide: `a * 1e18 / b`
pub fn wad_div(a: u128, b: u128) -> TrancheResult<u128> {
    mul_div(a, WAD, b)
}

/// Apply basis points: `amount * bps / 10000`
pub fn bps_mul(amount: u128, bps: u16) -> TrancheResult<u128> {
    mul_div(amount, bps as u128, BPS_DENOMINATOR)
}

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> TrancheResult<u128> {
    a.checked_add(b).ok_or(TrancheError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> TrancheResult<u128> {
    a.checked_sub(b).ok_or(TrancheError::Underflow)
}

/// Rate accumulated over a period: `rate * seconds`
pub fn rate_over(rate: u128, seconds: u64) -> TrancheResult<u128> {
    rate.checked_mul(seconds as u128).ok_or(TrancheError::Overflow)
}

/// Simple interest on `amount` at `rate` per second for `seconds`
pub fn simple_interest(amount: u128, rate: u128, seconds: u64) -> TrancheResult<u128> {
    wad_mul(amount, rate_over(rate, seconds)?)
}

/// Present value of `amount` due in `seconds` at simple discount `rate`:
/// `amount / (1 + rate * seconds)`
pub fn present_value(amount: u128, rate: u128, seconds: u64) -> TrancheResult<u128> {
    let factor = safe_add(WAD, rate_over(rate, seconds)?)?;
    wad_div(amount, factor)
}

/// Convert an annual rate in basis points to a per-second WAD rate
pub fn annual_bps_to_rate(bps: u64) -> TrancheResult<u128> {
    let annual = mul_div(bps as u128, WAD, BPS_DENOMINATOR)?;
    Ok(annual / SECONDS_PER_YEAR as u128)
}

// ============ Signed Helpers ============

/// Widen an unsigned amount into the signed domain
pub fn to_signed(value: u128) -> TrancheResult<i128> {
    i128::try_from(value).map_err(|_| TrancheError::Overflow)
}

/// Safe signed addition
pub fn signed_add(a: i128, b: i128) -> TrancheResult<i128> {
    a.checked_add(b).ok_or(TrancheError::Overflow)
}

/// Safe signed subtraction
pub fn signed_sub(a: i128, b: i128) -> TrancheResult<i128> {
    a.checked_sub(b).ok_or(TrancheError::Underflow)
}

/// Negative values clamp to zero
pub fn non_negative(value: i128) -> u128 {
    if value < 0 {
        0
    } else {
        value as u128
    }
}

/// Signed `a * b / denominator` for a signed numerator and positive factors
pub fn signed_mul_div(a: i128, b: u128, denominator: u128) -> TrancheResult<i128> {
    let magnitude = mul_div(a.unsigned_abs(), b, denominator)?;
    let magnitude = to_signed(magnitude)?;
    Ok(if a < 0 { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = WAD;

    #[test]
    fn test_mul_div_large_intermediate() {
        // 1e21 * 1e18 overflows u128 but the quotient does not
        let amount = 1_000 * ONE;
        assert_eq!(wad_mul(amount, ONE).unwrap(), amount);
        assert_eq!(wad_div(amount, 2 * ONE).unwrap(), 500 * ONE);
    }

    #[test]
    fn test_mul_div_errors() {
        assert_eq!(mul_div(1, 1, 0), Err(TrancheError::DivisionByZero));
        assert_eq!(mul_div(u128::MAX, 2, 1), Err(TrancheError::Overflow));
    }

    #[test]
    fn test_present_value() {
        // 110 due in 100s at 0.1% per second = 110 / 1.1 = 100
        let rate = ONE / 1_000;
        let pv = present_value(110 * ONE, rate, 100).unwrap();
        assert_eq!(pv, 100 * ONE);

        // Zero time leaves the amount untouched
        assert_eq!(present_value(110 * ONE, rate, 0).unwrap(), 110 * ONE);
    }

    #[test]
    fn test_simple_interest() {
        let rate = ONE / 1_000;
        assert_eq!(simple_interest(100 * ONE, rate, 100).unwrap(), 10 * ONE);
    }

    #[test]
    fn test_bps_mul() {
        // 5% of 200
        assert_eq!(bps_mul(200 * ONE, 500).unwrap(), 10 * ONE);
    }

    #[test]
    fn test_annual_bps_to_rate() {
        // 100% APR over a year accumulates to ~1.0
        let rate = annual_bps_to_rate(10_000).unwrap();
        let accumulated = rate * SECONDS_PER_YEAR as u128;
        assert!(accumulated <= ONE);
        assert!(ONE - accumulated < SECONDS_PER_YEAR as u128);
    }

    #[test]
    fn test_signed_helpers() {
        assert_eq!(non_negative(-5), 0);
        assert_eq!(non_negative(5), 5);
        assert_eq!(signed_mul_div(-100, 1, 4).unwrap(), -25);
        assert_eq!(signed_mul_div(100, 3, 4).unwrap(), 75);
        assert_eq!(signed_sub(i128::MIN, 1), Err(TrancheError::Underflow));
    }
}

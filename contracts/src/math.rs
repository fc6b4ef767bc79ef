//! # Fixed-Point Helpers
//!
//! Decimal normalization and the multiply-then-divide steps shared by the
//! market and the vault. Everything runs on 256-bit unsigned integers with
//! checked multiplication; division always floors.
//!
//! Truncation in [`normalize`] (downscaling) and in [`apply_fee`] is the only
//! source of dust in cross-decimal trades.

use alloy_primitives::U256;
use thiserror::Error;

use crate::config::{FEE_DENOMINATOR, MAX_POW10_EXPONENT};

/// Arithmetic failures. None of these occur for amounts below 2^128.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    /// An intermediate product exceeded 256 bits.
    #[error("arithmetic overflow")]
    Overflow,

    /// A divisor was zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A fee of 1000 parts-per-thousand or more was supplied.
    #[error("fee {0} out of range, must be lesser than 1000")]
    FeeOutOfRange(u16),
}

/// `10^exp`, or `None` when it does not fit in 256 bits.
pub fn pow10(exp: u8) -> Option<U256> {
    if exp > MAX_POW10_EXPONENT {
        return None;
    }
    Some(U256::from(10u64).pow(U256::from(exp)))
}

/// Rescales `amount` from `from_decimals` precision to `to_decimals`.
///
/// Downscaling floors toward zero; upscaling is exact or fails with
/// [`MathError::Overflow`].
pub fn normalize(amount: U256, from_decimals: u8, to_decimals: u8) -> Result<U256, MathError> {
    use std::cmp::Ordering;

    match from_decimals.cmp(&to_decimals) {
        Ordering::Equal => Ok(amount),
        Ordering::Greater => match pow10(from_decimals - to_decimals) {
            Some(factor) => Ok(amount / factor),
            // Any 256-bit amount divided by 10^78 or more is zero.
            None => Ok(U256::ZERO),
        },
        Ordering::Less => {
            if amount.is_zero() {
                return Ok(U256::ZERO);
            }
            let factor = pow10(to_decimals - from_decimals).ok_or(MathError::Overflow)?;
            amount.checked_mul(factor).ok_or(MathError::Overflow)
        }
    }
}

/// `floor(a * b / denominator)` with an overflow-checked product.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(MathError::Overflow)?;
    Ok(product / denominator)
}

/// Deducts a parts-per-thousand fee: `floor(gross * (1000 - fee) / 1000)`.
pub fn apply_fee(gross: U256, fee: u16) -> Result<U256, MathError> {
    if fee >= FEE_DENOMINATOR {
        return Err(MathError::FeeOutOfRange(fee));
    }
    mul_div(
        gross,
        U256::from(FEE_DENOMINATOR - fee),
        U256::from(FEE_DENOMINATOR),
    )
}

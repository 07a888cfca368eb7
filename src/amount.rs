//! Value amounts.
//!
//! Amounts are deterministic fixed-point numbers so that balances replayed
//! from the chain are exact: `1 - 0.4 + 1` is the same value as `1.6`.

use crate::error::ChainError;
use fixed::types::I32F32;

pub type Amount = I32F32;

pub const ZERO: Amount = I32F32::ZERO;

/// Parses a decimal amount such as `"0.4"` or `"12"`.
pub fn parse_amount(text: &str) -> Result<Amount, ChainError> {
    Amount::from_str(text.trim())
        .map_err(|e| ChainError::InvalidTransaction(format!("Invalid amount '{}': {}", text, e)))
}

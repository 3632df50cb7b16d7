//! Minor-unit money conversion.
//!
//! Amounts arrive as JSON numbers in decimal major units. Conversion to
//! gateway minor units must round half-up at two decimals, so it runs on the
//! decimal string form of the number, never through binary f64 arithmetic.

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MoneyError {
    #[error("invalid amount: {0}")]
    Invalid(String),
    #[error("amount must be greater than zero")]
    NotPositive,
}

/// Converts a decimal major-unit amount (e.g. `"10.00"`, `"0.015"`) to minor
/// units (cents), rounding half-up at two decimals.
pub fn to_minor_units(amount: &str) -> Result<i64, MoneyError> {
    let decimal =
        BigDecimal::from_str(amount.trim()).map_err(|_| MoneyError::Invalid(amount.to_string()))?;
    if decimal <= BigDecimal::from(0) {
        return Err(MoneyError::NotPositive);
    }
    let minor = (decimal * BigDecimal::from(100)).with_scale_round(0, RoundingMode::HalfUp);
    minor
        .to_i64()
        .ok_or_else(|| MoneyError::Invalid(amount.to_string()))
}

/// Converts a JSON number to minor units via its decimal string form.
pub fn number_to_minor_units(amount: &serde_json::Number) -> Result<i64, MoneyError> {
    to_minor_units(&amount.to_string())
}

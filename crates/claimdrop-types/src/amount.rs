//! Claim amounts: decimal strings checked against configured bounds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ClaimdropError, Result};

/// Inclusive bounds on a single claim amount, in token units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountLimits {
    pub min: Decimal,
    pub max: Decimal,
}

impl AmountLimits {
    pub fn new(min: &str, max: &str) -> Result<Self> {
        let min = parse_decimal(min)?;
        let max = parse_decimal(max)?;
        if min > max {
            return Err(ClaimdropError::InvalidAmount(format!(
                "limit min {} exceeds max {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }
}

impl Default for AmountLimits {
    fn default() -> Self {
        Self {
            min: Decimal::ONE,
            max: Decimal::from(5),
        }
    }
}

/// A positive token amount kept in its decimal string form.
///
/// The original text is what gets sent to the relay, so `"1.50"` stays
/// `"1.50"`; the parsed value is only used for range checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAmount {
    text: String,
    value: Decimal,
}

impl TokenAmount {
    /// Parse and range-check an amount.
    pub fn parse(raw: &str, limits: &AmountLimits) -> Result<Self> {
        let text = raw.trim().to_string();
        let value = parse_decimal(&text)?;
        if value <= Decimal::ZERO {
            return Err(ClaimdropError::InvalidAmount(format!(
                "amount must be positive: {}",
                raw
            )));
        }
        if value < limits.min || value > limits.max {
            return Err(ClaimdropError::AmountOutOfRange {
                amount: text,
                min: limits.min.to_string(),
                max: limits.max.to_string(),
            });
        }
        Ok(Self { text, value })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> Decimal {
        self.value
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClaimdropError::InvalidAmount("amount is empty".into()));
    }
    if !is_plain_decimal(trimmed) {
        return Err(ClaimdropError::InvalidAmount(format!(
            "{}: expected digits with an optional fractional part",
            raw
        )));
    }
    // Exact parsing: more fractional digits than a Decimal holds is an error, not a rounding.
    Decimal::from_str_exact(trimmed)
        .map_err(|e| ClaimdropError::InvalidAmount(format!("{}: {}", raw, e)))
}

/// `123` or `1.5`: ASCII digits on both sides of at most one dot, no sign or exponent.
fn is_plain_decimal(s: &str) -> bool {
    let (whole, fraction) = match s.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (s, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    digits(whole) && fraction.map_or(true, digits)
}

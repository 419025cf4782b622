//! Shared types for the claimdrop workspace.
//!
//! - `ClaimJob` / `ClaimStatus`: one claim attempt and its forward-only status
//! - `ChainTarget`: where a claim is sent (chain, token contract, relay wallet)
//! - `Address` / `TokenAmount`: validated user input
//! - `ClaimdropError`: the error type shared by every crate

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod amount;
pub mod chain;
pub mod job;

pub use amount::{AmountLimits, TokenAmount};
pub use chain::{chain_name, default_explorer_template, explorer_url, ChainTarget};
pub use job::{ClaimJob, ClaimStatus, FailureReason, StatusObservation};

/// Relay-assigned job identifier (`queueId`).
pub type JobId = String;

/// Claimdrop error types.
#[derive(Debug, Error)]
pub enum ClaimdropError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount {amount} outside accepted range {min}..={max}")]
    AmountOutOfRange {
        amount: String,
        min: String,
        max: String,
    },

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("relay request failed: {0}")]
    Relay(String),

    #[error("relay returned status {status}: {body}")]
    RelayStatus { status: u16, body: String },

    #[error("malformed relay response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Other(String),
}

impl ClaimdropError {
    /// True for errors raised while checking user input, before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClaimdropError::InvalidAddress(_)
                | ClaimdropError::InvalidAmount(_)
                | ClaimdropError::AmountOutOfRange { .. }
                | ClaimdropError::InvalidTarget(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClaimdropError>;

/// An EVM account address (`0x` followed by 20 hex-encoded bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ClaimdropError::InvalidAddress(format!("missing 0x prefix: {raw}")))?;
        if digits.len() != 40 {
            return Err(ClaimdropError::InvalidAddress(format!(
                "expected 40 hex digits, got {}: {}",
                digits.len(),
                raw
            )));
        }
        hex::decode(digits).map_err(|e| ClaimdropError::InvalidAddress(format!("{raw}: {e}")))?;
        Ok(Self(format!("0x{digits}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = ClaimdropError;

    fn try_from(value: String) -> Result<Self> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Cadence and bounds of a watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Delay between two status checks; the first check happens one interval after start.
    pub interval: Duration,
    /// Overall polling budget for one job.
    pub timeout: Duration,
    /// Consecutive failed checks tolerated before the job is marked failed.
    pub max_consecutive_errors: u32,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1_500),
            timeout: Duration::from_secs(5 * 60),
            max_consecutive_errors: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_accepts_checksummed_and_lowercase() {
        let a = Address::parse("0x52908400098527886E0F7030069857D2E4169EE7").unwrap();
        assert_eq!(a.as_str(), "0x52908400098527886E0F7030069857D2E4169EE7");

        let b = Address::parse("  0xde709f2102306220921060314715629080e2fb77 ").unwrap();
        assert_eq!(b.to_string(), "0xde709f2102306220921060314715629080e2fb77");
    }

    #[test]
    fn test_address_rejects_malformed_input() {
        for raw in [
            "",
            "52908400098527886E0F7030069857D2E4169EE7",
            "0xabc",
            "0x52908400098527886E0F7030069857D2E4169EZZ",
            "0x52908400098527886E0F7030069857D2E4169EE7aa",
        ] {
            let err = Address::parse(raw).unwrap_err();
            assert!(err.is_validation(), "expected validation error for {raw:?}");
        }
    }

    #[test]
    fn test_relay_errors_are_not_validation_errors() {
        assert!(!ClaimdropError::Relay("connection reset".into()).is_validation());
        assert!(!ClaimdropError::RelayStatus { status: 500, body: String::new() }.is_validation());
    }
}

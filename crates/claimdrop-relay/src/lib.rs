//! Transaction relay access.
//!
//! - `Relay`: the operations the claim flow needs from the relay
//! - `RelayClient`: HTTP implementation against the hosted relay API
//! - `ScriptedRelay`: in-memory relay with scripted answers

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use claimdrop_types::{Address, ChainTarget, JobId, Result, TokenAmount};

pub mod mock;
pub mod relay_client;

pub use mock::{ScriptedRelay, StatusReply};
pub use relay_client::RelayClient;

/// Claim-to request body: mint or transfer `amount` tokens to `recipient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub recipient: String,
    pub amount: String,
}

impl ClaimRequest {
    pub fn new(recipient: &Address, amount: &TokenAmount) -> Self {
        Self {
            recipient: recipient.to_string(),
            amount: amount.to_string(),
        }
    }
}

/// Raw transaction state as reported by the relay, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionStatus {
    #[serde(default)]
    pub queue_id: Option<String>,
    /// e.g. `queued`, `sent`, `mined`, `errored`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default, deserialize_with = "deserialize_chain_id")]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// A relay-managed backend wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendWallet {
    pub wallet_address: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Operations the claim flow needs from a transaction relay.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Queue a claim on one chain; returns the relay's job id.
    async fn claim_to(&self, target: &ChainTarget, request: &ClaimRequest) -> Result<JobId>;

    /// One status lookup for a queued job.
    async fn transaction_status(&self, job_id: &str) -> Result<RawTransactionStatus>;
}

// The relay reports chain ids as strings, older deployments as numbers.
fn deserialize_chain_id<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<Repr>::deserialize(deserializer)? {
        Some(Repr::Number(n)) => Some(n),
        Some(Repr::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_status_accepts_string_and_numeric_chain_ids() {
        let text: RawTransactionStatus = serde_json::from_str(
            r#"{"queueId":"q-1","status":"mined","transactionHash":"0xdead","chainId":"84532"}"#,
        )
        .unwrap();
        assert_eq!(text.chain_id, Some(84532));
        assert_eq!(text.transaction_hash.as_deref(), Some("0xdead"));

        let number: RawTransactionStatus =
            serde_json::from_str(r#"{"status":"queued","chainId":11155420}"#).unwrap();
        assert_eq!(number.chain_id, Some(11155420));

        let bare: RawTransactionStatus = serde_json::from_str(r#"{"chainId":null}"#).unwrap();
        assert_eq!(bare, RawTransactionStatus::default());
    }
}

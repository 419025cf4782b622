//! HTTP client for the hosted transaction relay.
//!
//! Endpoints:
//! - POST /contract/{chain_id}/{contract}/erc20/claim-to
//! - GET /transaction/status/{queue_id}
//! - POST /backend-wallet/create
//!
//! Every request carries `Authorization: Bearer <access token>`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use claimdrop_types::{ChainTarget, ClaimdropError, JobId, Result};
use std::time::Duration;
use tracing::debug;

use crate::{BackendWallet, ClaimRequest, RawTransactionStatus, Relay};

const BACKEND_WALLET_HEADER: &str = "x-backend-wallet-address";

/// Relay API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayResponse<T> {
    pub result: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueuedResult {
    queue_id: String,
}

#[derive(Debug, Clone, Serialize)]
struct CreateWalletRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

/// Relay client for queueing claims and reading their status.
pub struct RelayClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(base_url: &str, access_token: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(30_000);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ClaimdropError::Relay(format!("invalid relay url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClaimdropError::Relay(format!("relay url cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Queue an ERC-20 claim on one chain.
    ///
    /// POST /contract/{chain_id}/{contract}/erc20/claim-to
    pub async fn claim_to(&self, target: &ChainTarget, request: &ClaimRequest) -> Result<JobId> {
        let chain_id = target.chain_id.to_string();
        let url = self.endpoint(&["contract", &chain_id, &target.contract_address, "erc20", "claim-to"])?;
        debug!(chain_id = target.chain_id, recipient = %request.recipient, amount = %request.amount, "queueing claim");

        let resp = self.client
            .post(url)
            .bearer_auth(&self.access_token)
            .header(BACKEND_WALLET_HEADER, &target.backend_wallet)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClaimdropError::Relay(format!("claim request failed: {}", e)))?;

        let queued: QueuedResult = read_result(resp).await?;
        if queued.queue_id.trim().is_empty() {
            return Err(ClaimdropError::MalformedResponse("empty queueId".into()));
        }
        Ok(queued.queue_id)
    }

    /// Look up the current state of a queued transaction.
    ///
    /// GET /transaction/status/{queue_id}
    pub async fn transaction_status(&self, queue_id: &str) -> Result<RawTransactionStatus> {
        let url = self.endpoint(&["transaction", "status", queue_id])?;

        let resp = self.client
            .get(url)
            .bearer_auth(&self.access_token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClaimdropError::Relay(format!("status request failed: {}", e)))?;

        read_result(resp).await
    }

    /// Create a relay-managed backend wallet (e.g. `smart:local`).
    ///
    /// POST /backend-wallet/create
    pub async fn create_backend_wallet(&self, kind: &str) -> Result<BackendWallet> {
        let url = self.endpoint(&["backend-wallet", "create"])?;

        let resp = self.client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&CreateWalletRequest { kind })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClaimdropError::Relay(format!("wallet request failed: {}", e)))?;

        read_result(resp).await
    }
}

#[async_trait]
impl Relay for RelayClient {
    async fn claim_to(&self, target: &ChainTarget, request: &ClaimRequest) -> Result<JobId> {
        RelayClient::claim_to(self, target, request).await
    }

    async fn transaction_status(&self, job_id: &str) -> Result<RawTransactionStatus> {
        RelayClient::transaction_status(self, job_id).await
    }
}

async fn read_result<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClaimdropError::RelayStatus {
            status: status.as_u16(),
            body,
        });
    }

    let body: RelayResponse<T> = resp
        .json()
        .await
        .map_err(|e| ClaimdropError::MalformedResponse(format!("failed to parse relay response: {}", e)))?;
    Ok(body.result)
}

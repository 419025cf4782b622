//! Status polling for queued claims.
//!
//! - `StatusPoller::poll_status` / `poll`: one relay lookup, normalized into
//!   the claim status model
//! - `StatusPoller::watch`: repeat the lookup on a fixed cadence until the job
//!   is final, the time budget runs out, or the caller cancels
//!
//! Relay states map as follows: `queued` → Queued, `sent`/`submitted` → Sent,
//! `mined` → Mined (MinedPending while no hash is reported), `errored`/`failed`
//! → Failed. Anything else is read as Queued.

pub mod watch;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use claimdrop_relay::{RawTransactionStatus, Relay};
use claimdrop_types::{
    default_explorer_template, explorer_url, ChainTarget, ClaimJob, ClaimStatus, FailureReason,
    Result, StatusObservation, WatchOptions,
};

pub use watch::{WatchHandle, WatchOutcome};

/// Receiver of job updates produced by a watch loop.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn deliver(&self, job: ClaimJob);
}

#[async_trait]
impl<F> UpdateSink for F
where
    F: Fn(ClaimJob) + Send + Sync,
{
    async fn deliver(&self, job: ClaimJob) {
        self(job)
    }
}

/// Polls the relay for the state of queued claims.
#[derive(Clone)]
pub struct StatusPoller {
    relay: Arc<dyn Relay>,
    explorers: Arc<HashMap<u64, String>>,
}

impl StatusPoller {
    pub fn new(relay: Arc<dyn Relay>) -> Self {
        Self {
            relay,
            explorers: Arc::new(HashMap::new()),
        }
    }

    /// Use the explorer templates configured on `targets`.
    pub fn with_targets(self, targets: &[ChainTarget]) -> Self {
        let mut explorers = (*self.explorers).clone();
        for target in targets {
            if let Some(ref template) = target.explorer_tx_template {
                explorers.insert(target.chain_id, template.clone());
            }
        }
        Self {
            relay: self.relay,
            explorers: Arc::new(explorers),
        }
    }

    /// Explorer template for a chain: configured first, then the built-in table.
    pub fn explorer_template(&self, chain_id: u64) -> Option<&str> {
        self.explorers
            .get(&chain_id)
            .map(String::as_str)
            .or_else(|| default_explorer_template(chain_id))
    }

    /// One status lookup for `job_id`.
    ///
    /// Explorer links are derived from the chain id the relay reports.
    pub async fn poll_status(&self, job_id: &str) -> Result<StatusObservation> {
        self.observe(job_id, None).await
    }

    /// `poll_status` with explorer links falling back to `chain_id` when the
    /// relay does not report one.
    pub async fn poll_status_on(&self, job_id: &str, chain_id: u64) -> Result<StatusObservation> {
        self.observe(job_id, Some(chain_id)).await
    }

    /// One status lookup applied to `job`. The returned copy never moves backwards.
    pub async fn poll(&self, job: &ClaimJob) -> Result<ClaimJob> {
        let observation = self.observe(&job.job_id, Some(job.chain_id)).await?;
        let mut updated = job.clone();
        updated.apply(observation);
        self.link_explorer(&mut updated);
        Ok(updated)
    }

    /// Give a mined job the explorer link of the hash it stores.
    ///
    /// The relay may report a different hash at `mined` than the one first
    /// seen at `sent`; the job keeps the first hash, so its link is built here.
    pub fn link_explorer(&self, job: &mut ClaimJob) -> bool {
        match self.explorer_template(job.chain_id) {
            Some(template) => job.link_explorer(template),
            None => false,
        }
    }

    /// Spawn a watch loop for `job`; stop conditions are listed on the `watch` module.
    pub fn watch(
        &self,
        job: ClaimJob,
        sink: Arc<dyn UpdateSink>,
        options: WatchOptions,
    ) -> WatchHandle {
        self.watch_with_token(job, sink, options, CancellationToken::new())
    }

    /// `watch` stopped by `token`; pass a child token to cancel many watches at once.
    pub fn watch_with_token(
        &self,
        job: ClaimJob,
        sink: Arc<dyn UpdateSink>,
        options: WatchOptions,
        token: CancellationToken,
    ) -> WatchHandle {
        watch::spawn(self.clone(), job, sink, options, token)
    }

    pub(crate) async fn observe(
        &self,
        job_id: &str,
        fallback_chain_id: Option<u64>,
    ) -> Result<StatusObservation> {
        let raw = self.relay.transaction_status(job_id).await?;
        debug!(job_id, status = ?raw.status, "relay status");
        Ok(self.normalize(&raw, fallback_chain_id))
    }

    /// Map a raw relay status into the claim status model.
    pub fn normalize(
        &self,
        raw: &RawTransactionStatus,
        fallback_chain_id: Option<u64>,
    ) -> StatusObservation {
        let state = raw.status.as_deref().map(|s| s.trim().to_ascii_lowercase());
        let tx_hash = raw
            .transaction_hash
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string);

        match state.as_deref() {
            Some("sent") | Some("submitted") => StatusObservation {
                transaction_hash: tx_hash,
                ..StatusObservation::new(ClaimStatus::Sent)
            },
            Some("mined") => match tx_hash {
                Some(hash) => {
                    let explorer = raw
                        .chain_id
                        .or(fallback_chain_id)
                        .and_then(|chain_id| self.explorer_template(chain_id))
                        .map(|template| explorer_url(template, &hash));
                    StatusObservation {
                        transaction_hash: Some(hash),
                        explorer_url: explorer,
                        ..StatusObservation::new(ClaimStatus::Mined)
                    }
                }
                None => StatusObservation::new(ClaimStatus::MinedPending),
            },
            Some("errored") | Some("failed") => {
                let message = raw
                    .error_message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "transaction failed".into());
                StatusObservation {
                    transaction_hash: tx_hash,
                    ..StatusObservation::failed(FailureReason::RelayReported { message })
                }
            }
            _ => StatusObservation::new(ClaimStatus::Queued),
        }
    }
}

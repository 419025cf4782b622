//! Scripted in-memory relay for tests.
//!
//! Claims succeed with ids `<chain_id>-<n>` unless a chain was told to reject.
//! Status lookups replay a per-job script; the last entry repeats once the
//! script runs out, and unscripted jobs answer with the default reply
//! (`queued` unless changed).

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use claimdrop_types::{ChainTarget, ClaimdropError, JobId, Result};

use crate::{ClaimRequest, RawTransactionStatus, Relay};

/// One scripted answer to a status lookup.
#[derive(Debug, Clone)]
pub enum StatusReply {
    Raw(RawTransactionStatus),
    /// The lookup fails like a dropped connection.
    TransportError(String),
    /// The lookup never completes.
    Hang,
}

impl StatusReply {
    pub fn raw(status: &str) -> Self {
        StatusReply::Raw(RawTransactionStatus {
            status: Some(status.to_string()),
            ..Default::default()
        })
    }

    pub fn queued() -> Self {
        Self::raw("queued")
    }

    pub fn sent() -> Self {
        Self::raw("sent")
    }

    pub fn mined(tx_hash: &str, chain_id: u64) -> Self {
        StatusReply::Raw(RawTransactionStatus {
            status: Some("mined".into()),
            transaction_hash: Some(tx_hash.to_string()),
            chain_id: Some(chain_id),
            ..Default::default()
        })
    }

    pub fn errored(message: &str) -> Self {
        StatusReply::Raw(RawTransactionStatus {
            status: Some("errored".into()),
            error_message: Some(message.to_string()),
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone)]
struct Rejection {
    status: u16,
    body: String,
}

/// Relay double with scripted answers and call counters.
pub struct ScriptedRelay {
    rejections: Mutex<HashMap<u64, Rejection>>,
    scripts: Mutex<HashMap<String, VecDeque<StatusReply>>>,
    default_reply: Mutex<StatusReply>,
    claims: Mutex<Vec<(ChainTarget, ClaimRequest)>>,
    status_calls: Mutex<HashMap<String, usize>>,
    next_id: AtomicUsize,
}

impl ScriptedRelay {
    pub fn new() -> Self {
        Self {
            rejections: Mutex::new(HashMap::new()),
            scripts: Mutex::new(HashMap::new()),
            default_reply: Mutex::new(StatusReply::queued()),
            claims: Mutex::new(Vec::new()),
            status_calls: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Make every claim on `chain_id` fail with an HTTP error.
    pub fn reject_chain(&self, chain_id: u64, status: u16, body: &str) {
        lock(&self.rejections).insert(
            chain_id,
            Rejection {
                status,
                body: body.to_string(),
            },
        );
    }

    /// Script the answers for one job id, in order.
    pub fn script_status(&self, job_id: &str, replies: Vec<StatusReply>) {
        lock(&self.scripts).insert(job_id.to_string(), replies.into());
    }

    /// Answer for jobs without a script.
    pub fn set_default_status(&self, reply: StatusReply) {
        *lock(&self.default_reply) = reply;
    }

    /// Number of claim requests received, including rejected ones.
    pub fn claim_calls(&self) -> usize {
        lock(&self.claims).len()
    }

    /// Claim requests received so far.
    pub fn claims(&self) -> Vec<(ChainTarget, ClaimRequest)> {
        lock(&self.claims).clone()
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        lock(&self.status_calls).get(job_id).copied().unwrap_or(0)
    }

    pub fn total_status_calls(&self) -> usize {
        lock(&self.status_calls).values().sum()
    }

    fn next_reply(&self, job_id: &str) -> StatusReply {
        let mut scripts = lock(&self.scripts);
        match scripts.get_mut(job_id) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(StatusReply::queued()),
            Some(script) => script.front().cloned().unwrap_or(StatusReply::queued()),
            None => lock(&self.default_reply).clone(),
        }
    }
}

impl Default for ScriptedRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Relay for ScriptedRelay {
    async fn claim_to(&self, target: &ChainTarget, request: &ClaimRequest) -> Result<JobId> {
        lock(&self.claims).push((target.clone(), request.clone()));
        if let Some(rejection) = lock(&self.rejections).get(&target.chain_id).cloned() {
            return Err(ClaimdropError::RelayStatus {
                status: rejection.status,
                body: rejection.body,
            });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}-{}", target.chain_id, n))
    }

    async fn transaction_status(&self, job_id: &str) -> Result<RawTransactionStatus> {
        *lock(&self.status_calls).entry(job_id.to_string()).or_insert(0) += 1;
        match self.next_reply(job_id) {
            StatusReply::Raw(raw) => Ok(RawTransactionStatus {
                queue_id: Some(job_id.to_string()),
                ..raw
            }),
            StatusReply::TransportError(message) => Err(ClaimdropError::Relay(message)),
            StatusReply::Hang => std::future::pending().await,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

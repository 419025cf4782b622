//! Claim jobs and their forward-only status machine.
//!
//! Status order: `Queued < Sent < MinedPending < Mined`, with `Failed`
//! reachable from any non-terminal state. `Mined` and `Failed` are terminal.
//! Observations that would move a job backwards are dropped, so relay
//! inconsistencies and out-of-order deliveries never regress a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::explorer_url;
use crate::JobId;

/// Prefix of ids generated locally for submissions the relay never accepted.
pub const LOCAL_JOB_PREFIX: &str = "local-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    Queued,
    Sent,
    /// Mined according to the relay, but no transaction hash reported yet.
    MinedPending,
    Mined,
    Failed,
}

impl ClaimStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ClaimStatus::Mined | ClaimStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            ClaimStatus::Queued => 0,
            ClaimStatus::Sent => 1,
            ClaimStatus::MinedPending => 2,
            ClaimStatus::Mined | ClaimStatus::Failed => 3,
        }
    }

    /// Whether a job currently in `self` may move to `next`.
    pub fn can_advance_to(self, next: ClaimStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClaimStatus::Queued => "Queued",
            ClaimStatus::Sent => "Sent",
            ClaimStatus::MinedPending => "Pending",
            ClaimStatus::Mined => "Mined",
            ClaimStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The relay refused or could not be reached at submission time.
    Rejected { message: String },
    /// The relay reports the transaction itself failed.
    RelayReported { message: String },
    /// Polling ran out of time before a terminal status was seen.
    TimedOut { elapsed_ms: u64 },
    /// Too many consecutive status checks failed.
    RetriesExhausted { attempts: u32, last_error: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Rejected { message } => write!(f, "submission rejected: {}", message),
            FailureReason::RelayReported { message } => write!(f, "relay reported failure: {}", message),
            FailureReason::TimedOut { elapsed_ms } => {
                write!(f, "timed out after {}s without a final status", elapsed_ms / 1000)
            }
            FailureReason::RetriesExhausted { attempts, last_error } => write!(
                f,
                "status checks failed {} times in a row, last error: {}",
                attempts, last_error
            ),
        }
    }
}

/// One normalized reading of a job's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusObservation {
    pub status: ClaimStatus,
    pub transaction_hash: Option<String>,
    pub explorer_url: Option<String>,
    pub failure: Option<FailureReason>,
}

impl StatusObservation {
    pub fn new(status: ClaimStatus) -> Self {
        Self {
            status,
            transaction_hash: None,
            explorer_url: None,
            failure: None,
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        Self {
            failure: Some(reason),
            ..Self::new(ClaimStatus::Failed)
        }
    }
}

/// One claim attempt on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimJob {
    pub job_id: JobId,
    pub chain_id: u64,
    pub destination: String,
    /// Decimal string exactly as submitted.
    pub amount: String,
    pub status: ClaimStatus,
    pub transaction_hash: Option<String>,
    pub explorer_url: Option<String>,
    pub failure: Option<FailureReason>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClaimJob {
    /// A freshly accepted claim.
    pub fn queued(job_id: &str, chain_id: u64, destination: &str, amount: &str) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.to_string(),
            chain_id,
            destination: destination.to_string(),
            amount: amount.to_string(),
            status: ClaimStatus::Queued,
            transaction_hash: None,
            explorer_url: None,
            failure: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    /// A claim the relay never accepted. Gets a local id so it can be stored.
    pub fn rejected(chain_id: u64, destination: &str, amount: &str, message: &str) -> Self {
        let job_id = format!("{}{}", LOCAL_JOB_PREFIX, uuid::Uuid::new_v4());
        let mut job = Self::queued(&job_id, chain_id, destination, amount);
        job.status = ClaimStatus::Failed;
        job.failure = Some(FailureReason::Rejected {
            message: message.to_string(),
        });
        job
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the id was generated locally rather than by the relay.
    pub fn is_local(&self) -> bool {
        self.job_id.starts_with(LOCAL_JOB_PREFIX)
    }

    /// The job's current state expressed as an observation.
    pub fn observation(&self) -> StatusObservation {
        StatusObservation {
            status: self.status,
            transaction_hash: self.transaction_hash.clone(),
            explorer_url: self.explorer_url.clone(),
            failure: self.failure.clone(),
        }
    }

    /// Apply an observation, moving forward only. Returns whether anything changed.
    pub fn apply(&mut self, observation: StatusObservation) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        let mut changed = false;
        if observation.status != self.status {
            if !self.status.can_advance_to(observation.status) {
                return false;
            }
            self.status = observation.status;
            changed = true;
            if self.status == ClaimStatus::Failed {
                self.failure = Some(observation.failure.clone().unwrap_or(
                    FailureReason::RelayReported {
                        message: "transaction failed".into(),
                    },
                ));
            }
        }

        // Hash and link are write-once and only meaningful once the claim left the queue.
        let observed_hash = observation.transaction_hash.filter(|h| !h.is_empty());
        if self.status != ClaimStatus::Queued && self.transaction_hash.is_none() {
            if let Some(hash) = observed_hash.clone() {
                self.transaction_hash = Some(hash);
                changed = true;
            }
        }
        // The link must describe the stored hash, not a conflicting later one.
        if self.explorer_url.is_none()
            && self.transaction_hash.is_some()
            && observed_hash == self.transaction_hash
        {
            if let Some(url) = observation.explorer_url {
                self.explorer_url = Some(url);
                changed = true;
            }
        }

        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }

    /// Merge a newer copy of the same job.
    pub fn absorb(&mut self, other: &ClaimJob) -> bool {
        self.apply(other.observation())
    }

    /// Fill in the explorer link of a mined job from its stored hash.
    ///
    /// Returns whether the link was added. Jobs that are not `Mined`, have no
    /// hash, or already carry a link are left alone.
    pub fn link_explorer(&mut self, template: &str) -> bool {
        if self.status != ClaimStatus::Mined || self.explorer_url.is_some() {
            return false;
        }
        let Some(ref hash) = self.transaction_hash else {
            return false;
        };
        self.explorer_url = Some(explorer_url(template, hash));
        self.updated_at = Utc::now();
        true
    }

    /// Mark the job failed unless it already reached a terminal status.
    pub fn fail(&mut self, reason: FailureReason) -> bool {
        self.apply(StatusObservation::failed(reason))
    }
}

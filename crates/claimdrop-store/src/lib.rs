//! Result store for claim jobs.
//!
//! Defines the `ResultStore` trait the orchestrator publishes into and a
//! presentation layer reads from. Provides a `MemoryStore` for in-process use
//! and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use claimdrop_types::{ClaimJob, Result};

pub mod memory;

pub use memory::MemoryStore;

/// What an upsert did to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Same or older information than what is already stored.
    Unchanged,
}

/// Query for listing jobs, newest submissions last.
#[derive(Debug, Clone, Default)]
pub struct ListJobsQuery {
    pub chain_id: Option<u64>,
    pub destination: Option<String>,
    pub offset: usize,
    /// `None` returns everything after `offset`.
    pub limit: Option<usize>,
}

/// One page of jobs plus the size of the filtered set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPage {
    pub items: Vec<ClaimJob>,
    pub total: usize,
}

/// Storage for the accumulating list of claim attempts.
///
/// Implementations must key records by `job_id` and merge updates with
/// `ClaimJob::absorb`, so concurrent or reordered deliveries from several
/// watchers are safe and never regress a job's status.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn upsert_job(&self, job: &ClaimJob) -> Result<UpsertOutcome>;
    async fn get_job(&self, job_id: &str) -> Result<Option<ClaimJob>>;
    async fn list_jobs(&self, query: &ListJobsQuery) -> Result<JobPage>;
}

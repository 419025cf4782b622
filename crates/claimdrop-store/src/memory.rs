//! In-memory result store.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use crate::*;
use claimdrop_types::{ClaimdropError, Result};

/// In-memory result store (page lifetime, no persistence).
///
/// Jobs are kept in submission order; updates replace records in place.
pub struct MemoryStore {
    jobs: Mutex<Vec<ClaimJob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
        }
    }

    fn jobs(&self) -> Result<MutexGuard<'_, Vec<ClaimJob>>> {
        self.jobs
            .lock()
            .map_err(|_| ClaimdropError::Other("result store lock poisoned".into()))
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn upsert_job(&self, job: &ClaimJob) -> Result<UpsertOutcome> {
        let mut store = self.jobs()?;
        if let Some(existing) = store.iter_mut().find(|j| j.job_id == job.job_id) {
            let outcome = if existing.absorb(job) {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Unchanged
            };
            return Ok(outcome);
        }
        store.push(job.clone());
        Ok(UpsertOutcome::Inserted)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<ClaimJob>> {
        let store = self.jobs()?;
        Ok(store.iter().find(|j| j.job_id == job_id).cloned())
    }

    async fn list_jobs(&self, query: &ListJobsQuery) -> Result<JobPage> {
        let store = self.jobs()?;
        let filtered: Vec<&ClaimJob> = store
            .iter()
            .filter(|j| {
                if let Some(chain_id) = query.chain_id {
                    if j.chain_id != chain_id { return false; }
                }
                if let Some(ref destination) = query.destination {
                    if !j.destination.eq_ignore_ascii_case(destination) { return false; }
                }
                true
            })
            .collect();

        let total = filtered.len();
        let items = filtered
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(JobPage { items, total })
    }
}

//! Terminal lines for claim jobs.

use std::collections::HashMap;

use claimdrop_types::{chain_name, ChainTarget, ClaimJob, ClaimStatus, StatusObservation};

/// Chain labels for output, from configured names or the built-in table.
#[derive(Debug, Clone, Default)]
pub struct ChainLabels(HashMap<u64, String>);

impl ChainLabels {
    pub fn from_targets(targets: &[ChainTarget]) -> Self {
        Self(targets.iter().map(|t| (t.chain_id, t.display_name())).collect())
    }

    pub fn label(&self, chain_id: u64) -> String {
        self.0.get(&chain_id).cloned().unwrap_or_else(|| chain_name(chain_id))
    }
}

pub fn job_line(job: &ClaimJob, labels: &ChainLabels) -> String {
    let mut line = format!(
        "[{}] {} {} {} -> {}",
        labels.label(job.chain_id),
        job.job_id,
        job.status,
        job.amount,
        job.destination
    );
    if let Some(ref url) = job.explorer_url {
        line.push_str(&format!(" {}", url));
    } else if let Some(ref hash) = job.transaction_hash {
        line.push_str(&format!(" tx {}", hash));
    }
    if let Some(ref reason) = job.failure {
        line.push_str(&format!(" ({})", reason));
    }
    line
}

pub fn observation_line(job_id: &str, observation: &StatusObservation) -> String {
    let mut line = format!("{} {}", job_id, observation.status);
    if let Some(ref hash) = observation.transaction_hash {
        line.push_str(&format!(" tx {}", hash));
    }
    if let Some(ref url) = observation.explorer_url {
        line.push_str(&format!(" {}", url));
    }
    if let Some(ref reason) = observation.failure {
        line.push_str(&format!(" ({})", reason));
    }
    line
}

/// Counts by final outcome: (mined, failed, unfinished).
pub fn tally(jobs: &[ClaimJob]) -> (usize, usize, usize) {
    jobs.iter().fold((0, 0, 0), |(mined, failed, open), job| match job.status {
        ClaimStatus::Mined => (mined + 1, failed, open),
        ClaimStatus::Failed => (mined, failed + 1, open),
        _ => (mined, failed, open + 1),
    })
}

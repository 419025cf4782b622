//! Claim submission.
//!
//! Input is validated before anything reaches the relay. Each target chain
//! then gets its own claim request; the requests run concurrently and a
//! failure on one chain leaves the others untouched.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use claimdrop_relay::{ClaimRequest, Relay};
use claimdrop_types::{
    Address, AmountLimits, ChainTarget, ClaimJob, ClaimdropError, Result, TokenAmount,
};

/// Destination and amount that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClaim {
    pub destination: Address,
    pub amount: TokenAmount,
}

/// One entry of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    #[serde(alias = "toAddress", alias = "receiver")]
    pub destination: String,
    #[serde(alias = "quantity")]
    pub amount: String,
}

/// Result of submitting to one chain.
#[derive(Debug)]
pub enum ChainSubmission {
    /// Accepted by the relay; the job is `Queued`.
    Queued(ClaimJob),
    /// Refused or unreachable; `job` is already `Failed` under a local id.
    Rejected { job: ClaimJob, error: ClaimdropError },
}

impl ChainSubmission {
    pub fn job(&self) -> &ClaimJob {
        match self {
            ChainSubmission::Queued(job) => job,
            ChainSubmission::Rejected { job, .. } => job,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.job().chain_id
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, ChainSubmission::Queued(_))
    }

    pub fn error(&self) -> Option<&ClaimdropError> {
        match self {
            ChainSubmission::Queued(_) => None,
            ChainSubmission::Rejected { error, .. } => Some(error),
        }
    }

    pub fn into_job(self) -> ClaimJob {
        match self {
            ChainSubmission::Queued(job) => job,
            ChainSubmission::Rejected { job, .. } => job,
        }
    }
}

/// Queues claims with the relay.
pub struct ClaimSubmitter {
    relay: Arc<dyn Relay>,
    limits: AmountLimits,
}

impl ClaimSubmitter {
    pub fn new(relay: Arc<dyn Relay>, limits: AmountLimits) -> Self {
        Self { relay, limits }
    }

    pub fn limits(&self) -> &AmountLimits {
        &self.limits
    }

    /// Check destination and amount without touching the network.
    pub fn validate(&self, destination: &str, amount: &str) -> Result<ValidatedClaim> {
        Ok(ValidatedClaim {
            destination: Address::parse(destination)?,
            amount: TokenAmount::parse(amount, &self.limits)?,
        })
    }

    /// Submit one claim per target chain.
    ///
    /// Returns an error only for invalid input; relay failures are reported
    /// per chain as `ChainSubmission::Rejected`.
    pub async fn submit(
        &self,
        destination: &str,
        amount: &str,
        targets: &[ChainTarget],
    ) -> Result<Vec<ChainSubmission>> {
        let claim = self.validate(destination, amount)?;
        validate_targets(targets)?;

        let request = ClaimRequest::new(&claim.destination, &claim.amount);
        let submissions = join_all(
            targets
                .iter()
                .map(|target| self.submit_one(target, &claim, &request)),
        )
        .await;
        Ok(submissions)
    }

    /// Submit several destinations; each entry succeeds or fails on its own.
    pub async fn submit_batch(
        &self,
        entries: &[BatchEntry],
        targets: &[ChainTarget],
    ) -> Vec<Result<Vec<ChainSubmission>>> {
        join_all(
            entries
                .iter()
                .map(|entry| self.submit(&entry.destination, &entry.amount, targets)),
        )
        .await
    }

    async fn submit_one(
        &self,
        target: &ChainTarget,
        claim: &ValidatedClaim,
        request: &ClaimRequest,
    ) -> ChainSubmission {
        let destination = claim.destination.as_str();
        let amount = claim.amount.as_str();
        match self.relay.claim_to(target, request).await {
            Ok(job_id) => {
                info!(chain_id = target.chain_id, job_id = %job_id, destination, amount, "claim queued");
                ChainSubmission::Queued(ClaimJob::queued(&job_id, target.chain_id, destination, amount))
            }
            Err(error) => {
                warn!(chain_id = target.chain_id, destination, error = %error, "claim rejected");
                let job = ClaimJob::rejected(target.chain_id, destination, amount, &error.to_string());
                ChainSubmission::Rejected { job, error }
            }
        }
    }
}

fn validate_targets(targets: &[ChainTarget]) -> Result<()> {
    if targets.is_empty() {
        return Err(ClaimdropError::InvalidTarget("no target chains given".into()));
    }
    let mut seen = HashSet::new();
    for target in targets {
        if !seen.insert(target.chain_id) {
            return Err(ClaimdropError::InvalidTarget(format!(
                "chain {} listed more than once",
                target.chain_id
            )));
        }
        Address::parse(&target.contract_address).map_err(|e| {
            ClaimdropError::InvalidTarget(format!("chain {} contract: {}", target.chain_id, e))
        })?;
        Address::parse(&target.backend_wallet).map_err(|e| {
            ClaimdropError::InvalidTarget(format!("chain {} backend wallet: {}", target.chain_id, e))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use claimdrop_relay::{RawTransactionStatus, ScriptedRelay};
    use claimdrop_types::{ClaimStatus, FailureReason, JobId};
    use std::time::Duration;
    use tokio::time::Instant;

    const DEST: &str = "0xde709f2102306220921060314715629080e2fb77";
    const CONTRACT: &str = "0x2222222222222222222222222222222222222222";
    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    fn targets() -> Vec<ChainTarget> {
        vec![
            ChainTarget::new(11155420, CONTRACT, WALLET),
            ChainTarget::new(84532, CONTRACT, WALLET),
        ]
    }

    fn submitter(relay: Arc<dyn Relay>) -> ClaimSubmitter {
        ClaimSubmitter::new(relay, AmountLimits::default())
    }

    #[tokio::test]
    async fn test_submit_returns_one_queued_job_per_chain() {
        let relay = Arc::new(ScriptedRelay::new());
        let submissions = submitter(relay.clone()).submit(DEST, "3", &targets()).await.unwrap();

        assert_eq!(submissions.len(), 2);
        for (submission, target) in submissions.iter().zip(targets()) {
            assert!(submission.is_queued());
            let job = submission.job();
            assert!(!job.job_id.is_empty());
            assert_eq!(job.chain_id, target.chain_id);
            assert_eq!(job.status, ClaimStatus::Queued);
            assert_eq!(job.destination, DEST);
            assert_eq!(job.amount, "3");
        }

        let claims = relay.claims();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].1, ClaimRequest { recipient: DEST.into(), amount: "3".into() });
    }

    #[tokio::test]
    async fn test_invalid_input_makes_no_network_call() {
        let relay = Arc::new(ScriptedRelay::new());
        let s = submitter(relay.clone());

        for (destination, amount) in [(DEST, "0"), (DEST, "6"), (DEST, "abc"), ("0xabc", "3")] {
            let err = s.submit(destination, amount, &targets()).await.unwrap_err();
            assert!(err.is_validation(), "{destination} {amount}: {err:?}");
        }
        assert_eq!(relay.claim_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_targets_make_no_network_call() {
        let relay = Arc::new(ScriptedRelay::new());
        let s = submitter(relay.clone());

        let err = s.submit(DEST, "3", &[]).await.unwrap_err();
        assert!(matches!(err, ClaimdropError::InvalidTarget(_)));

        let mut dup = targets();
        dup.push(ChainTarget::new(84532, CONTRACT, WALLET));
        let err = s.submit(DEST, "3", &dup).await.unwrap_err();
        assert!(matches!(err, ClaimdropError::InvalidTarget(_)));

        let bad_contract = vec![ChainTarget::new(84532, "not-an-address", WALLET)];
        assert!(s.submit(DEST, "3", &bad_contract).await.is_err());

        assert_eq!(relay.claim_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_chain_does_not_affect_siblings() {
        let relay = Arc::new(ScriptedRelay::new());
        relay.reject_chain(84532, 500, "backend wallet out of gas");

        let submissions = submitter(relay.clone()).submit(DEST, "2", &targets()).await.unwrap();
        assert!(submissions[0].is_queued());
        assert!(!submissions[1].is_queued());

        let rejected = &submissions[1];
        assert!(matches!(rejected.error(), Some(ClaimdropError::RelayStatus { status: 500, .. })));
        let job = rejected.job();
        assert!(job.is_local());
        assert_eq!(job.status, ClaimStatus::Failed);
        match &job.failure {
            Some(FailureReason::Rejected { message }) => assert!(message.contains("out of gas")),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(relay.claim_calls(), 2);
    }

    /// Relay whose claims take one second each.
    struct SlowRelay;

    #[async_trait]
    impl Relay for SlowRelay {
        async fn claim_to(&self, target: &ChainTarget, _request: &ClaimRequest) -> Result<JobId> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(format!("slow-{}", target.chain_id))
        }

        async fn transaction_status(&self, _job_id: &str) -> Result<RawTransactionStatus> {
            Ok(RawTransactionStatus::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chains_are_submitted_concurrently() {
        let started = Instant::now();
        let submissions = submitter(Arc::new(SlowRelay)).submit(DEST, "1", &targets()).await.unwrap();
        assert_eq!(submissions.len(), 2);
        assert!(started.elapsed() < Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn test_batch_entries_are_independent() {
        let relay = Arc::new(ScriptedRelay::new());
        let entries: Vec<BatchEntry> = serde_json::from_str(&format!(
            r#"[{{"toAddress":"{DEST}","amount":"1"}},{{"toAddress":"0xnope","amount":"1"}},{{"receiver":"{DEST}","quantity":"5"}}]"#
        ))
        .unwrap();

        let results = submitter(relay.clone()).submit_batch(&entries, &targets()).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().len(), 2);
        assert!(results[1].as_ref().unwrap_err().is_validation());
        assert_eq!(results[2].as_ref().unwrap()[0].job().amount, "5");
        assert_eq!(relay.claim_calls(), 4);
    }
}

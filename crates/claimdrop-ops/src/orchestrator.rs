//! Claim orchestration: submit, watch every resulting job, publish updates.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use claimdrop_poller::{StatusPoller, UpdateSink, WatchHandle, WatchOutcome};
use claimdrop_store::{ResultStore, UpsertOutcome};
use claimdrop_types::{ChainTarget, ClaimJob, ClaimdropError, Result, WatchOptions};

use crate::submitter::{BatchEntry, ChainSubmission, ClaimSubmitter};

/// Callback for every job change that reached the store.
pub type JobUpdateHandler = Box<dyn Fn(&ClaimJob) + Send + Sync>;

/// Store attempts for a job in a terminal status.
const FINAL_PUBLISH_ATTEMPTS: u32 = 3;
const PUBLISH_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Publishes deliveries into the store, then to the handler if anything changed.
struct StoreSink {
    store: Arc<dyn ResultStore>,
    on_update: Option<JobUpdateHandler>,
}

impl StoreSink {
    /// Returns whether the store holds this update afterwards. Only final
    /// updates are retried.
    async fn publish(&self, job: &ClaimJob) -> bool {
        let attempts = if job.is_terminal() { FINAL_PUBLISH_ATTEMPTS } else { 1 };
        for attempt in 1..=attempts {
            match self.store.upsert_job(job).await {
                Ok(UpsertOutcome::Unchanged) => {
                    debug!(job_id = %job.job_id, status = %job.status, "store already up to date");
                    return true;
                }
                Ok(outcome) => {
                    debug!(job_id = %job.job_id, status = %job.status, ?outcome, "job published");
                    if let Some(ref handler) = self.on_update {
                        handler(job);
                    }
                    return true;
                }
                Err(e) if attempt < attempts => {
                    warn!(job_id = %job.job_id, attempt, error = %e, "failed to store job update, retrying");
                    tokio::time::sleep(PUBLISH_RETRY_DELAY * attempt).await;
                }
                Err(e) => {
                    error!(job_id = %job.job_id, status = %job.status, error = %e, "job update not stored");
                }
            }
        }
        false
    }
}

/// Counts a watch handed to `wait_idle` until its join ends or is dropped.
struct Awaited<'a>(&'a AtomicUsize);

impl<'a> Awaited<'a> {
    fn new(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for Awaited<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UpdateSink for StoreSink {
    async fn deliver(&self, job: ClaimJob) {
        self.publish(&job).await;
    }
}

/// Runs claims end to end and keeps the result store current.
///
/// Every job returned by [`ClaimOrchestrator::claim`] is watched in the
/// background until it is final, times out, or the orchestrator shuts down.
/// Dropping the orchestrator cancels all outstanding watches.
pub struct ClaimOrchestrator {
    submitter: ClaimSubmitter,
    poller: StatusPoller,
    sink: Arc<StoreSink>,
    options: WatchOptions,
    watches: Mutex<Vec<WatchHandle>>,
    /// Watches taken by `wait_idle` and not joined yet.
    awaited: AtomicUsize,
    closed: AtomicBool,
    /// Parent of every watch token.
    shutdown: CancellationToken,
}

impl ClaimOrchestrator {
    pub fn new(
        submitter: ClaimSubmitter,
        poller: StatusPoller,
        store: Arc<dyn ResultStore>,
        options: WatchOptions,
        on_update: Option<JobUpdateHandler>,
    ) -> Self {
        Self {
            submitter,
            poller,
            sink: Arc::new(StoreSink { store, on_update }),
            options,
            watches: Mutex::new(Vec::new()),
            awaited: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.sink.store
    }

    /// Submit `amount` to `destination` on every target and start watching.
    ///
    /// Returns the initial jobs as soon as the relay has answered; rejected
    /// chains come back already `Failed`. Invalid input fails before any
    /// network call.
    pub async fn claim(
        &self,
        destination: &str,
        amount: &str,
        targets: &[ChainTarget],
    ) -> Result<Vec<ClaimJob>> {
        self.ensure_open()?;
        let submissions = self.submitter.submit(destination, amount, targets).await?;
        let jobs = self.track(submissions).await;
        info!(destination, amount, jobs = jobs.len(), "claim submitted");
        Ok(jobs)
    }

    /// `claim` for several destinations; one result per entry, in input order.
    pub async fn claim_batch(
        &self,
        entries: &[BatchEntry],
        targets: &[ChainTarget],
    ) -> Result<Vec<Result<Vec<ClaimJob>>>> {
        self.ensure_open()?;
        let mut results = Vec::with_capacity(entries.len());
        for outcome in self.submitter.submit_batch(entries, targets).await {
            match outcome {
                Ok(submissions) => results.push(Ok(self.track(submissions).await)),
                Err(e) => results.push(Err(e)),
            }
        }
        Ok(results)
    }

    /// Cancel every outstanding watch. Later calls are no-ops.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        info!(active = self.active_watches(), "orchestrator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of watches that have not ended yet, including those a
    /// `wait_idle` call is still waiting on.
    pub fn active_watches(&self) -> usize {
        let listed = lock(&self.watches).iter().filter(|h| !h.is_finished()).count();
        listed + self.awaited.load(Ordering::SeqCst)
    }

    /// Wait for every watch started so far to end. Safe to race with `shutdown`.
    ///
    /// Final jobs are written to the store once more, so an update the store
    /// refused while the watch ran is not lost.
    pub async fn wait_idle(&self) -> Vec<WatchOutcome> {
        let handles = std::mem::take(&mut *lock(&self.watches));
        let joins = handles.into_iter().map(|handle| {
            let awaited = Awaited::new(&self.awaited);
            async move {
                let joined = handle.join().await;
                drop(awaited);
                joined
            }
        });

        let mut outcomes = Vec::new();
        for joined in join_all(joins).await {
            match joined {
                Ok(outcome) => {
                    if let WatchOutcome::Finished(ref job) = outcome {
                        self.sink.publish(job).await;
                    }
                    outcomes.push(outcome);
                }
                Err(e) => warn!(error = %e, "watch task ended abnormally"),
            }
        }
        outcomes
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(ClaimdropError::Other("orchestrator is shut down".into()));
        }
        Ok(())
    }

    /// Publish the initial jobs, then start a watch per job.
    async fn track(&self, submissions: Vec<ChainSubmission>) -> Vec<ClaimJob> {
        let jobs: Vec<ClaimJob> = submissions.into_iter().map(ChainSubmission::into_job).collect();
        for job in &jobs {
            self.sink.publish(job).await;
        }

        let mut watches = lock(&self.watches);
        watches.retain(|h| !h.is_finished());
        for job in &jobs {
            let sink: Arc<dyn UpdateSink> = self.sink.clone();
            watches.push(self.poller.watch_with_token(
                job.clone(),
                sink,
                self.options,
                self.shutdown.child_token(),
            ));
        }
        jobs
    }
}

impl Drop for ClaimOrchestrator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

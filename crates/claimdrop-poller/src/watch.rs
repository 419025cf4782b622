//! Watch loops: one spawned task per job.
//!
//! A loop checks the relay once per interval, the first check one interval
//! after start, and never runs two checks for the same job at once. It stops
//! when:
//! - the job reaches `Mined` or `Failed` (final update delivered),
//! - the time budget runs out (job failed with `TimedOut`; a check still in
//!   flight at the deadline is abandoned),
//! - more than `max_consecutive_errors` checks fail in a row (job failed with
//!   `RetriesExhausted`),
//! - the handle is cancelled (nothing is delivered afterwards, including the
//!   result of a check already in flight).
//!
//! Only changes are delivered to the sink. A job that is already terminal is
//! delivered once and never polled.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use claimdrop_types::{ClaimJob, ClaimdropError, FailureReason, Result, WatchOptions};

use crate::{StatusPoller, UpdateSink};

/// How a watch loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The job reached a terminal status; this is its final state.
    Finished(ClaimJob),
    Cancelled,
}

/// Handle to a running watch loop.
///
/// Dropping the handle detaches the loop; call [`WatchHandle::cancel`] to stop it.
#[derive(Debug)]
pub struct WatchHandle {
    job_id: String,
    token: CancellationToken,
    task: JoinHandle<WatchOutcome>,
}

impl WatchHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stop the loop. Safe to call any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end.
    pub async fn join(self) -> Result<WatchOutcome> {
        self.task
            .await
            .map_err(|e| ClaimdropError::Other(format!("watch task for {} failed: {}", self.job_id, e)))
    }
}

pub(crate) fn spawn(
    poller: StatusPoller,
    job: ClaimJob,
    sink: Arc<dyn UpdateSink>,
    options: WatchOptions,
    token: CancellationToken,
) -> WatchHandle {
    let job_id = job.job_id.clone();
    let task = tokio::spawn(run(poller, job, sink, options, token.clone()));
    WatchHandle { job_id, token, task }
}

async fn run(
    poller: StatusPoller,
    mut job: ClaimJob,
    sink: Arc<dyn UpdateSink>,
    options: WatchOptions,
    token: CancellationToken,
) -> WatchOutcome {
    if job.is_terminal() {
        if token.is_cancelled() {
            return WatchOutcome::Cancelled;
        }
        sink.deliver(job.clone()).await;
        return WatchOutcome::Finished(job);
    }

    let started = Instant::now();
    let deadline = started + options.timeout;
    let mut ticker = interval_at(started + options.interval, options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_errors = 0u32;
    let mut ticks = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return WatchOutcome::Cancelled,
            _ = sleep_until(deadline) => {
                return finish_timed_out(job, started, &sink, &token).await;
            }
            _ = ticker.tick() => {}
        }

        ticks += 1;
        let checked = tokio::select! {
            biased;
            _ = token.cancelled() => return WatchOutcome::Cancelled,
            _ = sleep_until(deadline) => None,
            result = poller.observe(&job.job_id, Some(job.chain_id)) => Some(result),
        };
        let Some(result) = checked else {
            return finish_timed_out(job, started, &sink, &token).await;
        };
        if token.is_cancelled() {
            return WatchOutcome::Cancelled;
        }

        match result {
            Ok(observation) => {
                consecutive_errors = 0;
                let observed = observation.status;
                let applied = job.apply(observation);
                let linked = poller.link_explorer(&mut job);
                if applied || linked {
                    debug!(job_id = %job.job_id, status = %job.status, tick = ticks, "job updated");
                    sink.deliver(job.clone()).await;
                } else if observed != job.status {
                    debug!(job_id = %job.job_id, stored = %job.status, observed = %observed, "ignoring stale status");
                }
                if job.is_terminal() {
                    info!(job_id = %job.job_id, status = %job.status, ticks, "watch finished");
                    return WatchOutcome::Finished(job);
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!(job_id = %job.job_id, attempt = consecutive_errors, error = %e, "status check failed");
                if consecutive_errors > options.max_consecutive_errors {
                    job.fail(FailureReason::RetriesExhausted {
                        attempts: consecutive_errors,
                        last_error: e.to_string(),
                    });
                    warn!(job_id = %job.job_id, ticks, "giving up after repeated status failures");
                    sink.deliver(job.clone()).await;
                    return WatchOutcome::Finished(job);
                }
            }
        }
    }
}

async fn finish_timed_out(
    mut job: ClaimJob,
    started: Instant,
    sink: &Arc<dyn UpdateSink>,
    token: &CancellationToken,
) -> WatchOutcome {
    if token.is_cancelled() {
        return WatchOutcome::Cancelled;
    }
    let elapsed_ms = started.elapsed().as_millis() as u64;
    job.fail(FailureReason::TimedOut { elapsed_ms });
    warn!(job_id = %job.job_id, elapsed_ms, "watch timed out");
    sink.deliver(job.clone()).await;
    WatchOutcome::Finished(job)
}

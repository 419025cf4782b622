//! End-to-end claim flow: submit, then follow every job to a final status.
//!
//! - `ClaimSubmitter`: validates input and queues one claim per target chain
//! - `ClaimOrchestrator`: submits, watches each job and publishes updates into
//!   a `ResultStore`

pub mod orchestrator;
pub mod submitter;

pub use orchestrator::{ClaimOrchestrator, JobUpdateHandler};
pub use submitter::{BatchEntry, ChainSubmission, ClaimSubmitter, ValidatedClaim};

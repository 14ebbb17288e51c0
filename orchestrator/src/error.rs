use thiserror::Error;

use schemahub_checkpoint::CheckpointError;
use schemahub_core::{Classify, ErrorKind};
use schemahub_fetcher::FetcherError;
use schemahub_lock::LockError;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetcherError),

    /// A backend store stayed unavailable past the bounded retry budget
    /// (`spec.md` §7 `StoreUnavailable`: "retry with backoff at the
    /// orchestrator level (bounded); then fatal").
    #[error("store unavailable after {attempts} attempts: {last_error}")]
    StoreUnavailableExhausted { attempts: u32, last_error: String },

    /// The heartbeat observed the lock was lost while a fetch was still in
    /// flight; the run is aborted before any further checkpoint write.
    #[error("lock lost mid-run for {lock_name}")]
    LockLostMidRun { lock_name: String },

    /// The run's wall-clock ceiling elapsed before the fetch completed.
    #[error("run exceeded its wall-clock ceiling")]
    WallClockExceeded,
}

impl Classify for OrchestratorError {
    fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Lock(e) => e.kind(),
            OrchestratorError::Checkpoint(e) => e.kind(),
            OrchestratorError::Fetch(e) => e.kind(),
            OrchestratorError::StoreUnavailableExhausted { .. } => ErrorKind::StoreUnavailable,
            OrchestratorError::LockLostMidRun { .. } => ErrorKind::LockLost,
            OrchestratorError::WallClockExceeded => ErrorKind::TransportError,
        }
    }
}

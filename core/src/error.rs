use serde::{Deserialize, Serialize};

/// Closed sum type of every error disposition the ingestion core can reach.
/// Every crate-local error type (e.g. `AdapterError`, `WriterError`,
/// `LockError`) implements `Classify` so the orchestrator can dispatch on a
/// single enum without matching on each crate's concrete error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// HTTP 429. Re-enqueue; never counted as a circuit failure.
    RateLimited,
    /// HTTP 5xx. Re-enqueue up to `max_attempts`; counts as a circuit failure.
    ServerError,
    /// Network/timeout. Re-enqueue; counts as a circuit failure.
    TransportError,
    /// Malformed response body. Re-enqueue up to `max_attempts`; counts as
    /// a circuit failure.
    ProtocolError,
    /// HTTP 4xx other than 429. Fatal: aborts the run, no checkpoint advance.
    ClientError,
    /// Circuit breaker reports a nonzero wait and the worker's retry budget
    /// cannot absorb it.
    CircuitOpen,
    /// Checkpoint content failed to parse or had an invalid cursor value.
    CheckpointCorrupt,
    /// An attempted checkpoint save was lower than the current value outside
    /// of an explicit full-refresh reset.
    CheckpointNonMonotonic,
    /// Another process already holds the product lock.
    LockHeld,
    /// The lock heartbeat failed to renew before expiry.
    LockLost,
    /// The raw writer was given trades out of `trade_id` order.
    UnorderedBatch,
    /// The backing object/KV store was unreachable after bounded retries.
    StoreUnavailable,
}

impl ErrorKind {
    /// Whether this outcome should be reported to the circuit breaker as a
    /// failed attempt.
    pub fn counts_as_circuit_failure(self) -> bool {
        matches!(
            self,
            ErrorKind::ServerError | ErrorKind::TransportError | ErrorKind::ProtocolError | ErrorKind::ClientError
        )
    }

    /// Whether this outcome is fatal to the run regardless of remaining
    /// retry budget.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::ClientError
                | ErrorKind::CheckpointCorrupt
                | ErrorKind::CheckpointNonMonotonic
                | ErrorKind::LockLost
                | ErrorKind::UnorderedBatch
        )
    }

    /// Whether a cursor that hit this error should go back on the work
    /// queue (subject to `max_attempts`), as opposed to terminating the run
    /// outright.
    pub fn is_retriable_for_cursor(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::ServerError | ErrorKind::TransportError | ErrorKind::ProtocolError
        )
    }
}

/// Implemented by every crate-local error enum so callers above them (the
/// fetcher, the orchestrator) can branch on disposition uniformly.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

use thiserror::Error;

use schemahub_adapter::AdapterError;
use schemahub_circuitbreaker::CircuitError;
use schemahub_core::ids::TradeId;
use schemahub_core::{Classify, ErrorKind};
use schemahub_ratelimiter::RateLimiterError;
use schemahub_writer::WriterError;

#[derive(Error, Debug)]
pub enum FetcherError {
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("circuit breaker error: {0}")]
    Circuit(#[from] CircuitError),

    #[error("rate limiter error: {0}")]
    RateLimiter(#[from] RateLimiterError),

    #[error("raw writer error: {0}")]
    Writer(#[from] WriterError),

    /// A cursor exhausted `max_attempts` retries without succeeding.
    #[error("cursor after={after} exhausted retries: {last_error}")]
    AttemptsExhausted { after: TradeId, last_error: String },

    /// The injected checkpoint sink rejected a flush's advance.
    #[error("checkpoint advance failed after flush: {0}")]
    CheckpointAdvance(String),

    /// The run's cancellation token fired mid-fetch.
    #[error("fetch cancelled")]
    Cancelled,
}

impl Classify for FetcherError {
    fn kind(&self) -> ErrorKind {
        match self {
            FetcherError::Adapter(e) => e.kind(),
            FetcherError::Circuit(e) => e.kind(),
            FetcherError::RateLimiter(_) => ErrorKind::TransportError,
            FetcherError::Writer(e) => e.kind(),
            FetcherError::AttemptsExhausted { .. } => ErrorKind::ServerError,
            FetcherError::CheckpointAdvance(_) => ErrorKind::CheckpointNonMonotonic,
            FetcherError::Cancelled => ErrorKind::TransportError,
        }
    }
}

use thiserror::Error;

use schemahub_core::{Classify, ErrorKind};
use schemahub_kvstore::KvError;

#[derive(Error, Debug)]
pub enum CircuitError {
    /// The caller must wait before issuing its next attempt; the worker's
    /// retry budget decides whether to sleep it out or re-enqueue.
    #[error("circuit for {source:?} is open; retry after {wait_ms}ms")]
    Open { source: String, wait_ms: u64 },

    #[error("health record for {0:?} failed to (de)serialize")]
    Serialization(#[from] serde_json::Error),

    #[error("health store backend error: {0}")]
    Backend(#[from] KvError),
}

impl Classify for CircuitError {
    fn kind(&self) -> ErrorKind {
        match self {
            CircuitError::Open { .. } => ErrorKind::CircuitOpen,
            CircuitError::Serialization(_) => ErrorKind::ProtocolError,
            CircuitError::Backend(_) => ErrorKind::StoreUnavailable,
        }
    }
}

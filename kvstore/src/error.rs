use thiserror::Error;

use schemahub_core::{Classify, ErrorKind};

#[derive(Error, Debug)]
pub enum KvError {
    /// The conditional write's expectation did not hold (someone else holds
    /// the record, or the version has moved on).
    #[error("conditional write failed: expectation did not hold for key {0:?}")]
    VersionMismatch(String),

    #[error("kv store backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("kv store unavailable: {0}")]
    Unavailable(String),
}

impl Classify for KvError {
    fn kind(&self) -> ErrorKind {
        match self {
            KvError::VersionMismatch(_) => ErrorKind::LockHeld,
            KvError::Backend(_) | KvError::Unavailable(_) => ErrorKind::StoreUnavailable,
        }
    }
}

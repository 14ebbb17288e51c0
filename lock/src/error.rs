use thiserror::Error;

use schemahub_core::{Classify, ErrorKind};
use schemahub_kvstore::KvError;

#[derive(Error, Debug)]
pub enum LockError {
    /// Another process holds a non-expired lock on this name.
    #[error("lock {0:?} is held by another process")]
    Held(String),

    /// A renew (or release) observed that the record no longer matches this
    /// holder's version — it expired and was reclaimed, or was forcibly
    /// released underneath us.
    #[error("lock {0:?} was lost (renew/release observed a version mismatch)")]
    Lost(String),

    #[error("lock store backend error: {0}")]
    Backend(#[from] KvError),

    #[error("lock record failed to (de)serialize: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Classify for LockError {
    fn kind(&self) -> ErrorKind {
        match self {
            LockError::Held(_) => ErrorKind::LockHeld,
            LockError::Lost(_) => ErrorKind::LockLost,
            LockError::Backend(_) => ErrorKind::StoreUnavailable,
            LockError::Serialization(_) => ErrorKind::ProtocolError,
        }
    }
}

use thiserror::Error;

use schemahub_core::{Classify, ErrorKind};

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("object store key rejected: {0}")]
    InvalidKey(String),

    #[error("object store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

impl Classify for ObjectStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            ObjectStoreError::InvalidKey(_) => ErrorKind::ProtocolError,
            ObjectStoreError::Io(_) | ObjectStoreError::Unavailable(_) => ErrorKind::StoreUnavailable,
        }
    }
}

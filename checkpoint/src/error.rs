use thiserror::Error;

use schemahub_core::ids::TradeId;
use schemahub_core::{Classify, ErrorKind};
use schemahub_objectstore::ObjectStoreError;

#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Stored content failed to parse, or parsed into a structurally
    /// invalid cursor. Never auto-reset — requires operator intervention
    /// (`spec.md` §7 `CheckpointCorrupt`).
    #[error("checkpoint for {product_id:?} is corrupt: {reason}")]
    Corrupt { product_id: String, reason: String },

    /// An attempted save did not strictly exceed the current watermark
    /// outside of an explicit full-refresh reset. Indicates a logic bug
    /// upstream; always fatal.
    #[error("checkpoint for {product_id:?} would regress: attempted {attempted}, current {current}")]
    NonMonotonic {
        product_id: String,
        attempted: TradeId,
        current: TradeId,
    },

    #[error("checkpoint backing store error: {0}")]
    Store(#[from] ObjectStoreError),
}

impl Classify for CheckpointError {
    fn kind(&self) -> ErrorKind {
        match self {
            CheckpointError::Corrupt { .. } => ErrorKind::CheckpointCorrupt,
            CheckpointError::NonMonotonic { .. } => ErrorKind::CheckpointNonMonotonic,
            CheckpointError::Store(_) => ErrorKind::StoreUnavailable,
        }
    }
}

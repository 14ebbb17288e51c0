use thiserror::Error;

use schemahub_core::{Classify, ErrorKind};
use schemahub_objectstore::ObjectStoreError;

#[derive(Error, Debug)]
pub enum WriterError {
    /// The caller passed trades not in strictly ascending `trade_id` order.
    /// Indicates a logic bug upstream (the aggregator); always fatal.
    #[error("batch is not strictly ascending by trade_id at index {index}")]
    UnorderedBatch { index: usize },

    /// The writer contract requires a non-empty batch.
    #[error("attempted to write an empty batch")]
    EmptyBatch,

    #[error("raw object store error: {0}")]
    Store(#[from] ObjectStoreError),
}

impl Classify for WriterError {
    fn kind(&self) -> ErrorKind {
        match self {
            WriterError::UnorderedBatch { .. } => ErrorKind::UnorderedBatch,
            // An empty batch never reaches a real flush in practice (the
            // aggregator only flushes a non-empty buffer); treat it the
            // same as a logic-bug-grade ordering violation.
            WriterError::EmptyBatch => ErrorKind::UnorderedBatch,
            WriterError::Store(_) => ErrorKind::StoreUnavailable,
        }
    }
}

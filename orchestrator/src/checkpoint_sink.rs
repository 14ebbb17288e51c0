//! Wires `schemahub_fetcher::CheckpointSink` to the real
//! `schemahub_checkpoint::CheckpointManager`, and refuses to advance once
//! the product lock's heartbeat reports it lost — `spec.md` §7 `LockLost`:
//! "Fatal; abort before any further write."

use async_trait::async_trait;
use schemahub_core::ids::TradeId;
use schemahub_fetcher::{CheckpointSink, FetcherError};
use schemahub_lock::HeartbeatOutcome;
use schemahub_objectstore::ObjectStore;
use tokio::sync::watch;

use crate::retry::with_store_retry_or_exhausted;

pub(crate) struct CheckpointAdvanceSink<'a, O: ObjectStore> {
    checkpoint: &'a schemahub_checkpoint::CheckpointManager<O>,
    source: String,
    product_id: String,
    lock_outcome: watch::Receiver<HeartbeatOutcome>,
}

impl<'a, O: ObjectStore> CheckpointAdvanceSink<'a, O> {
    pub(crate) fn new(
        checkpoint: &'a schemahub_checkpoint::CheckpointManager<O>,
        source: impl Into<String>,
        product_id: impl Into<String>,
        lock_outcome: watch::Receiver<HeartbeatOutcome>,
    ) -> Self {
        Self {
            checkpoint,
            source: source.into(),
            product_id: product_id.into(),
            lock_outcome,
        }
    }
}

#[async_trait]
impl<'a, O: ObjectStore + Send + Sync> CheckpointSink for CheckpointAdvanceSink<'a, O> {
    async fn advance(&self, to: TradeId) -> Result<(), FetcherError> {
        if *self.lock_outcome.borrow() == HeartbeatOutcome::Lost {
            return Err(FetcherError::CheckpointAdvance("product lock lost; refusing to advance checkpoint".into()));
        }

        with_store_retry_or_exhausted(|| self.checkpoint.save(&self.source, &self.product_id, to))
            .await
            .map_err(|e| FetcherError::CheckpointAdvance(e.to_string()))
    }
}

//! Watermark checkpoint manager, `spec.md` §4.3.
//!
//! Backed by `schemahub_objectstore::ObjectStore`, which already gives us
//! both backends the spec calls for with identical semantics: a local
//! filesystem store (temp file + atomic rename) and a remote object store
//! (atomic single-object `PUT`) are both just `ObjectStore` implementations,
//! so this manager is generic over the trait rather than branching on a
//! backend enum.

mod error;

pub use error::CheckpointError;

use chrono::Utc;
use schemahub_core::ids::TradeId;
use schemahub_core::model::{RawObjectKey, Watermark};
use schemahub_objectstore::ObjectStore;
use tracing::{info, instrument, warn};

/// `cursor == 0` (or the object being entirely absent) both mean "first
/// run" (`spec.md` §3 Watermark: "0 or absent means first run"). This is
/// also the value an explicit full-refresh reset writes, since the wire
/// format has no separate null representation for "no checkpoint".
const SENTINEL_NO_CHECKPOINT: TradeId = 0;

pub struct CheckpointManager<O: ObjectStore> {
    store: O,
    prefix: String,
}

impl<O: ObjectStore> CheckpointManager<O> {
    pub fn new(store: O, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn key(&self, source: &str, product_id: &str) -> String {
        RawObjectKey::checkpoint_key(&self.prefix, source, product_id)
    }

    /// Loads the current watermark. `Ok(None)` means first run (invariant
    /// I1's base case); never silently resets on corrupt content — that is
    /// always an `Err`.
    #[instrument(skip(self), fields(source, product_id))]
    pub async fn load(&self, source: &str, product_id: &str) -> Result<Option<TradeId>, CheckpointError> {
        let key = self.key(source, product_id);
        let Some(bytes) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let watermark: Watermark = serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Corrupt {
            product_id: product_id.to_string(),
            reason: e.to_string(),
        })?;

        if watermark.cursor == SENTINEL_NO_CHECKPOINT {
            return Ok(None);
        }
        Ok(Some(watermark.cursor))
    }

    /// Saves `cursor` as the new watermark. Fails with `NonMonotonic` if
    /// `cursor` does not strictly exceed the currently loaded value — the
    /// only caller permitted to bypass this is `reset`, gated on an
    /// explicit full-refresh mode flag (`spec.md` §4.3).
    #[instrument(skip(self), fields(source, product_id, cursor))]
    pub async fn save(&self, source: &str, product_id: &str, cursor: TradeId) -> Result<(), CheckpointError> {
        let current = self.load(source, product_id).await?.unwrap_or(SENTINEL_NO_CHECKPOINT);
        if cursor <= current {
            return Err(CheckpointError::NonMonotonic {
                product_id: product_id.to_string(),
                attempted: cursor,
                current,
            });
        }

        self.write_raw(source, product_id, cursor).await?;
        info!(source, product_id, cursor, "checkpoint advanced");
        Ok(())
    }

    /// Explicitly resets the checkpoint to `NONE`. This is the only
    /// permitted non-monotonic transition (`spec.md` §4.3 "Full-refresh
    /// mode") — callers must gate this behind an explicit mode flag, never
    /// invoke it implicitly on corrupt-content recovery.
    #[instrument(skip(self), fields(source, product_id))]
    pub async fn reset(&self, source: &str, product_id: &str) -> Result<(), CheckpointError> {
        warn!(source, product_id, "checkpoint explicitly reset for full refresh");
        self.write_raw(source, product_id, SENTINEL_NO_CHECKPOINT).await
    }

    async fn write_raw(&self, source: &str, product_id: &str, cursor: TradeId) -> Result<(), CheckpointError> {
        let watermark = Watermark {
            cursor,
            last_updated: Utc::now(),
        };
        let bytes = serde_json::to_vec(&watermark).expect("Watermark always serializes");
        self.store.put(&self.key(source, product_id), bytes).await?;
        Ok(())
    }
}

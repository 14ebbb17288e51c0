//! Raw-object writer, `spec.md` §4.7: serializes an ordered batch of trades
//! to newline-delimited JSON and performs one atomic `PUT` under the
//! deterministic key schema in `spec.md` §3.

mod error;

pub use error::WriterError;

use chrono::{DateTime, Utc};
use schemahub_core::ids::RunId;
use schemahub_core::model::{RawObjectKey, Trade};
use schemahub_objectstore::ObjectStore;
use tracing::{info, instrument};

pub struct RawWriter<O: ObjectStore> {
    store: O,
    prefix: String,
}

impl<O: ObjectStore> RawWriter<O> {
    pub fn new(store: O, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Writes `trades` (must already be sorted strictly ascending by
    /// `trade_id`, single product, single run) as one raw object. Retries
    /// of the same call with the same `(source, product_id, run_id,
    /// created_at)` and the same `trades` produce the same key and are
    /// idempotent at the object-store level (`spec.md` §4.7, invariant O1).
    #[instrument(skip(self, trades), fields(source, product_id, run_id = %run_id, count = trades.len()))]
    pub async fn write(
        &self,
        source: &str,
        product_id: &str,
        run_id: RunId,
        created_at: DateTime<Utc>,
        trades: &[Trade],
    ) -> Result<RawObjectKey, WriterError> {
        let Some(first) = trades.first() else {
            return Err(WriterError::EmptyBatch);
        };

        for window in trades.windows(2) {
            if window[1].trade_id <= window[0].trade_id {
                let index = trades.iter().position(|t| t.trade_id == window[1].trade_id).unwrap_or(0);
                return Err(WriterError::UnorderedBatch { index });
            }
        }

        let last = trades.last().expect("non-empty, checked above");
        let key = RawObjectKey {
            prefix: self.prefix.clone(),
            source: source.to_string(),
            product_id: product_id.to_string(),
            created_at,
            run_id,
            first_id: first.trade_id,
            last_id: last.trade_id,
            count: trades.len() as u64,
        };

        let mut body = Vec::new();
        for trade in trades {
            serde_json::to_writer(&mut body, trade).expect("Trade always serializes");
            body.push(b'\n');
        }

        let rendered = key.render();
        self.store.put(&rendered, body).await?;
        info!(key = %rendered, "raw object written");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use schemahub_core::model::Side;
    use schemahub_objectstore::testing::InMemoryObjectStore;

    fn trade(id: u64) -> Trade {
        Trade {
            trade_id: id,
            product_id: "BTC-USD".to_string(),
            price: Decimal::new(100, 0),
            size: Decimal::new(1, 0),
            time: Utc::now(),
            side: Side::Buy,
            source: "coinbase".to_string(),
            source_ingest_ts: Utc::now(),
            raw_payload: None,
        }
    }

    fn writer() -> RawWriter<InMemoryObjectStore> {
        RawWriter::new(InMemoryObjectStore::new(), "s3://bucket/raw")
    }

    #[tokio::test]
    async fn writes_and_renders_expected_key_fields() {
        let w = writer();
        let run_id = RunId::new();
        let created_at: DateTime<Utc> = "2026-07-27T12:00:03Z".parse().unwrap();
        let trades: Vec<Trade> = (1001..=1010).map(trade).collect();

        let key = w.write("coinbase", "BTC-USD", run_id, created_at, &trades).await.unwrap();
        assert_eq!(key.first_id, 1001);
        assert_eq!(key.last_id, 1010);
        assert_eq!(key.count, 10);
        assert!(key.render().contains(&format!("_{run_id}_1001_1010_10.jsonl")));
    }

    #[tokio::test]
    async fn rejects_unordered_batch() {
        let w = writer();
        let trades = vec![trade(5), trade(3)];
        let err = w.write("coinbase", "BTC-USD", RunId::new(), Utc::now(), &trades).await.unwrap_err();
        assert!(matches!(err, WriterError::UnorderedBatch { .. }));
    }

    #[tokio::test]
    async fn rejects_duplicate_consecutive_ids_as_unordered() {
        let w = writer();
        let trades = vec![trade(5), trade(5)];
        let err = w.write("coinbase", "BTC-USD", RunId::new(), Utc::now(), &trades).await.unwrap_err();
        assert!(matches!(err, WriterError::UnorderedBatch { .. }));
    }

    #[tokio::test]
    async fn rejects_empty_batch() {
        let w = writer();
        let err = w.write("coinbase", "BTC-USD", RunId::new(), Utc::now(), &[]).await.unwrap_err();
        assert!(matches!(err, WriterError::EmptyBatch));
    }

    /// P5: within each raw object, trade_id is strictly ascending in the
    /// serialized body (we only assert what we wrote, matching input order).
    #[tokio::test]
    async fn body_is_newline_delimited_json_in_order() {
        let w = writer();
        let run_id = RunId::new();
        let created_at = Utc::now();
        let trades: Vec<Trade> = vec![trade(1), trade(2), trade(3)];

        let key = w.write("coinbase", "BTC-USD", run_id, created_at, &trades).await.unwrap();
        let bytes = w.store.get(&key.render()).await.unwrap().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let ids: Vec<u64> = text
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["trade_id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    /// P4: identical inputs (including run_id and created_at) produce the
    /// same key on retry.
    #[tokio::test]
    async fn retry_with_identical_inputs_is_idempotent_on_key() {
        let w = writer();
        let run_id = RunId::new();
        let created_at = Utc::now();
        let trades: Vec<Trade> = vec![trade(1), trade(2)];

        let key_a = w.write("coinbase", "BTC-USD", run_id, created_at, &trades).await.unwrap();
        let key_b = w.write("coinbase", "BTC-USD", run_id, created_at, &trades).await.unwrap();
        assert_eq!(key_a.render(), key_b.render());
    }

    /// P3: different run ids never collide on key, all else equal.
    #[tokio::test]
    async fn different_runs_never_collide() {
        let w = writer();
        let created_at = Utc::now();
        let trades: Vec<Trade> = vec![trade(1), trade(2)];

        let key_a = w.write("coinbase", "BTC-USD", RunId::new(), created_at, &trades).await.unwrap();
        let key_b = w.write("coinbase", "BTC-USD", RunId::new(), created_at, &trades).await.unwrap();
        assert_ne!(key_a.render(), key_b.render());
    }

    proptest::proptest! {
        #[test]
        fn strictly_ascending_batches_always_succeed(ids in proptest::collection::btree_set(1u64..100_000, 1..50)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let w = writer();
                let trades: Vec<Trade> = ids.into_iter().map(trade).collect();
                let result = w.write("coinbase", "BTC-USD", RunId::new(), Utc::now(), &trades).await;
                assert!(result.is_ok());
            });
        }
    }
}

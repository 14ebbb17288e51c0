//! In-memory `ConditionalStore` fake used by lock/circuit-breaker tests to
//! exercise concurrent CAS races without a live database, the same "stress
//! test against a shared fake" shape as
//! `backend::session::store::tests::test_concurrent_ensure_candidates_stress`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{ConditionalStore, Expectation, KvError, StoredRecord};

#[derive(Default)]
pub struct InMemoryKvStore {
    records: Mutex<HashMap<String, StoredRecord>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConditionalStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, KvError> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn put_if(
        &self,
        key: &str,
        expect: Expectation,
        value: Vec<u8>,
        ttl: Option<DateTime<Utc>>,
    ) -> Result<i64, KvError> {
        let mut records = self.records.lock().unwrap();
        let now = Utc::now();

        match expect {
            Expectation::AbsentOrExpired => {
                let blocked = records
                    .get(key)
                    .map(|r| r.expires_at.map(|e| e > now).unwrap_or(true))
                    .unwrap_or(false);
                if blocked {
                    return Err(KvError::VersionMismatch(key.to_string()));
                }
                let next_version = records.get(key).map(|r| r.version + 1).unwrap_or(1);
                records.insert(
                    key.to_string(),
                    StoredRecord {
                        value,
                        version: next_version,
                        expires_at: ttl,
                    },
                );
                Ok(next_version)
            }
            Expectation::Version(expected) => {
                let matches = records.get(key).map(|r| r.version == expected).unwrap_or(false);
                if !matches {
                    return Err(KvError::VersionMismatch(key.to_string()));
                }
                let next_version = expected + 1;
                records.insert(
                    key.to_string(),
                    StoredRecord {
                        value,
                        version: next_version,
                        expires_at: ttl,
                    },
                );
                Ok(next_version)
            }
        }
    }

    async fn delete_if(&self, key: &str, expected_version: i64) -> Result<(), KvError> {
        let mut records = self.records.lock().unwrap();
        match records.get(key) {
            None => Ok(()),
            Some(r) if r.version == expected_version => {
                records.remove(key);
                Ok(())
            }
            Some(_) => Err(KvError::VersionMismatch(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_or_expired_allows_first_write() {
        let store = InMemoryKvStore::new();
        let v = store
            .put_if("lock:a", Expectation::AbsentOrExpired, b"x".to_vec(), None)
            .await
            .unwrap();
        assert_eq!(v, 1);
    }

    #[tokio::test]
    async fn absent_or_expired_blocks_second_writer_when_unexpired() {
        let store = InMemoryKvStore::new();
        store
            .put_if("lock:a", Expectation::AbsentOrExpired, b"x".to_vec(), Some(Utc::now() + chrono::Duration::seconds(60)))
            .await
            .unwrap();

        let err = store
            .put_if("lock:a", Expectation::AbsentOrExpired, b"y".to_vec(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::VersionMismatch(_)));
    }

    #[tokio::test]
    async fn absent_or_expired_allows_reclaim_after_expiry() {
        let store = InMemoryKvStore::new();
        store
            .put_if(
                "lock:a",
                Expectation::AbsentOrExpired,
                b"x".to_vec(),
                Some(Utc::now() - chrono::Duration::seconds(1)),
            )
            .await
            .unwrap();

        let v = store
            .put_if("lock:a", Expectation::AbsentOrExpired, b"y".to_vec(), None)
            .await
            .unwrap();
        assert_eq!(v, 2);
    }

    #[tokio::test]
    async fn version_mismatch_rejects_stale_renew() {
        let store = InMemoryKvStore::new();
        store
            .put_if("lock:a", Expectation::AbsentOrExpired, b"x".to_vec(), None)
            .await
            .unwrap();

        let err = store
            .put_if("lock:a", Expectation::Version(99), b"y".to_vec(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::VersionMismatch(_)));
    }

    #[tokio::test]
    async fn delete_if_is_noop_when_absent() {
        let store = InMemoryKvStore::new();
        store.delete_if("missing", 1).await.unwrap();
    }
}

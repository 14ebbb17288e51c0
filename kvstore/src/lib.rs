//! Conditional key-value store abstraction backing the lock service and the
//! circuit breaker's health store. Required operations are a
//! compare-and-swap write (`put_if`) and a compare-and-swap delete
//! (`delete_if`), each keyed on an expected version or absence/expiry.

mod error;
mod sqlx_store;

#[cfg(feature = "test-util")]
pub mod testing;

pub use error::KvError;
pub use sqlx_store::SqlxKvStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A record's current version and payload, as observed by `get`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredRecord {
    pub value: Vec<u8>,
    pub version: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

/// What the caller expects the current record state to be before a
/// conditional write is allowed to proceed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expectation {
    /// The key must not exist, or must exist but have already expired.
    /// This is the lock/health "first writer wins" path.
    AbsentOrExpired,
    /// The key must exist at exactly this version. Used to renew or mutate
    /// a record only the current holder/owner should be able to touch.
    Version(i64),
}

#[async_trait]
pub trait ConditionalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, KvError>;

    /// Writes `value` under `key` with the given `ttl` (absolute expiry, or
    /// `None` for records that never expire) iff `expect` holds. Returns the
    /// new version on success.
    async fn put_if(
        &self,
        key: &str,
        expect: Expectation,
        value: Vec<u8>,
        ttl: Option<DateTime<Utc>>,
    ) -> Result<i64, KvError>;

    /// Deletes `key` iff its current version equals `expected_version`.
    /// A no-op (not an error) if the key is already absent, so a lock
    /// release racing an expiry reclaim never fails spuriously.
    async fn delete_if(&self, key: &str, expected_version: i64) -> Result<(), KvError>;
}

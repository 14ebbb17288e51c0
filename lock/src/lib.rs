//! Distributed lock service, `spec.md` §4.4: at-most-one writer per
//! product, enforced via the conditional-write `ConditionalStore` (§6),
//! with a background heartbeat task that renews at `ttl/4` cadence.

mod error;
mod heartbeat;
mod names;

pub use error::LockError;
pub use heartbeat::{Heartbeat, HeartbeatOutcome};
pub use names::{job_lock_name, product_lock_name};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use schemahub_core::model::LockRecord;
use schemahub_kvstore::{ConditionalStore, Expectation};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Ownership token returned by a successful `acquire`. Carries the store
/// version so `renew`/`release` can issue precise conditional writes
/// without re-reading first.
#[derive(Clone, Debug)]
pub struct LockHandle {
    pub lock_name: String,
    pub lock_id: Uuid,
    version: i64,
}

pub struct DistributedLock<S: ConditionalStore> {
    store: Arc<S>,
}

impl<S: ConditionalStore> DistributedLock<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(lock_name, holder))]
    pub async fn acquire(&self, lock_name: &str, holder: &str, ttl: Duration) -> Result<LockHandle, LockError> {
        let lock_id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());

        let record = LockRecord {
            lock_name: lock_name.to_string(),
            lock_id,
            holder: holder.to_string(),
            acquired_at: now,
            ttl: expires_at,
        };
        let bytes = serde_json::to_vec(&record)?;

        match self
            .store
            .put_if(lock_name, Expectation::AbsentOrExpired, bytes, Some(expires_at))
            .await
        {
            Ok(version) => {
                info!(lock_id = %lock_id, "lock acquired");
                Ok(LockHandle {
                    lock_name: lock_name.to_string(),
                    lock_id,
                    version,
                })
            }
            Err(schemahub_kvstore::KvError::VersionMismatch(_)) => {
                warn!("lock held by another process");
                Err(LockError::Held(lock_name.to_string()))
            }
            Err(e) => Err(LockError::Backend(e)),
        }
    }

    /// Extends the lock's expiry. Fails with `Lost` if the record no longer
    /// matches this handle's version (expired-and-reclaimed, or released).
    #[instrument(skip(self, handle), fields(lock_name = %handle.lock_name, lock_id = %handle.lock_id))]
    pub async fn renew(&self, handle: &mut LockHandle, ttl: Duration) -> Result<(), LockError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());

        let record = LockRecord {
            lock_name: handle.lock_name.clone(),
            lock_id: handle.lock_id,
            holder: String::new(),
            acquired_at: now,
            ttl: expires_at,
        };
        let bytes = serde_json::to_vec(&record)?;

        match self
            .store
            .put_if(&handle.lock_name, Expectation::Version(handle.version), bytes, Some(expires_at))
            .await
        {
            Ok(version) => {
                handle.version = version;
                Ok(())
            }
            Err(schemahub_kvstore::KvError::VersionMismatch(_)) => Err(LockError::Lost(handle.lock_name.clone())),
            Err(e) => Err(LockError::Backend(e)),
        }
    }

    /// Releases the lock. A no-op if it is not currently held by this
    /// handle (already expired or already released), matching `spec.md`
    /// §4.4's `release` contract.
    #[instrument(skip(self, handle), fields(lock_name = %handle.lock_name, lock_id = %handle.lock_id))]
    pub async fn release(&self, handle: &LockHandle) -> Result<(), LockError> {
        match self.store.delete_if(&handle.lock_name, handle.version).await {
            Ok(()) => {
                info!("lock released");
                Ok(())
            }
            Err(schemahub_kvstore::KvError::VersionMismatch(_)) => {
                // Someone else already reclaimed it; nothing left for us to do.
                warn!("release observed the lock already reclaimed");
                Ok(())
            }
            Err(e) => Err(LockError::Backend(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemahub_kvstore::testing::InMemoryKvStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::task::JoinSet;

    fn lock() -> DistributedLock<InMemoryKvStore> {
        DistributedLock::new(Arc::new(InMemoryKvStore::new()))
    }

    #[tokio::test]
    async fn second_acquire_is_held() {
        let l = lock();
        let _h1 = l.acquire("product:coinbase:BTC-USD", "worker-a", Duration::from_secs(30)).await.unwrap();

        let err = l
            .acquire("product:coinbase:BTC-USD", "worker-b", Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Held(_)));
    }

    #[tokio::test]
    async fn release_then_acquire_succeeds() {
        let l = lock();
        let h1 = l.acquire("p", "a", Duration::from_secs(30)).await.unwrap();
        l.release(&h1).await.unwrap();

        let h2 = l.acquire("p", "b", Duration::from_secs(30)).await;
        assert!(h2.is_ok());
    }

    #[tokio::test]
    async fn renew_extends_and_wrong_version_is_lost() {
        let l = lock();
        let mut h = l.acquire("p", "a", Duration::from_secs(30)).await.unwrap();
        l.renew(&mut h, Duration::from_secs(30)).await.unwrap();

        // A stale clone (pre-renew version) must observe Lost.
        let mut stale = h.clone();
        stale.version -= 1;
        let err = l.renew(&mut stale, Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(err, LockError::Lost(_)));
    }

    #[tokio::test]
    async fn release_of_already_expired_lock_is_a_noop() {
        let l = lock();
        let h = l.acquire("p", "a", Duration::from_secs(30)).await.unwrap();
        l.release(&h).await.unwrap();
        // Releasing again must not error.
        l.release(&h).await.unwrap();
    }

    /// P6: at any instant, at most one concurrent acquirer wins.
    #[tokio::test]
    async fn at_most_one_concurrent_winner() {
        let l = Arc::new(lock());
        let winners = Arc::new(AtomicUsize::new(0));
        let mut set = JoinSet::new();

        for i in 0..20 {
            let l = l.clone();
            let winners = winners.clone();
            set.spawn(async move {
                if l.acquire("contended", &format!("w{i}"), Duration::from_secs(30)).await.is_ok() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        while set.join_next().await.is_some() {}
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}

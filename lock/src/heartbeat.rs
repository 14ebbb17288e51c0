//! Lock heartbeat, `spec.md` §4.4 "Heartbeat": the orchestrator renews its
//! product lock at `ttl/4` cadence in a background task. Failure to renew
//! must terminate the run with an error before any further checkpoint
//! write, so this reports its outcome through a `watch` channel the
//! orchestrator polls (or selects on) rather than silently dying.

use std::sync::Arc;
use std::time::Duration;

use schemahub_kvstore::ConditionalStore;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{DistributedLock, LockHandle};

/// Latest known state of a background heartbeat task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// All renewals so far have succeeded; the lock is presumed held.
    Holding,
    /// A renewal observed `Lost` — the lock record no longer matches this
    /// handle's version (expired-and-reclaimed by someone else, or
    /// force-released). The run must abort before any further checkpoint
    /// write, per `spec.md` §7 `LockLost`.
    Lost,
    /// The owning run cancelled the heartbeat cleanly (normal shutdown).
    Stopped,
}

/// Background renewal task plus a handle callers can poll or await on.
pub struct Heartbeat {
    outcome: watch::Receiver<HeartbeatOutcome>,
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<LockHandle>,
}

impl Heartbeat {
    /// Spawns the renewal loop. Renews every `ttl / 4` (per `spec.md`
    /// §4.4); the first renewal fires after that same interval, not
    /// immediately, since the caller just acquired a fresh `ttl`-long lease.
    #[instrument(skip(lock, handle, cancel), fields(lock_name = %handle.lock_name, lock_id = %handle.lock_id))]
    pub fn spawn<S>(lock: Arc<DistributedLock<S>>, handle: LockHandle, ttl: Duration, cancel: CancellationToken) -> Self
    where
        S: ConditionalStore + 'static,
    {
        let (tx, rx) = watch::channel(HeartbeatOutcome::Holding);
        let period = ttl / 4;
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            let mut handle = handle;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = task_cancel.cancelled() => {
                        let _ = tx.send(HeartbeatOutcome::Stopped);
                        break;
                    }
                }

                match lock.renew(&mut handle, ttl).await {
                    Ok(()) => {
                        info!(lock_id = %handle.lock_id, "lock renewed");
                        let _ = tx.send(HeartbeatOutcome::Holding);
                    }
                    Err(e) => {
                        warn!(error = %e, "lock renewal failed; signalling loss");
                        let _ = tx.send(HeartbeatOutcome::Lost);
                        break;
                    }
                }
            }
            handle
        });

        Self { outcome: rx, cancel, join }
    }

    /// Current known state. Never blocks.
    pub fn outcome(&self) -> HeartbeatOutcome {
        *self.outcome.borrow()
    }

    /// A cheap, clonable view of the outcome, for callers (like a
    /// checkpoint-advance callback) that need to check "is this lock still
    /// held?" immediately before a write without going through `Heartbeat`
    /// itself.
    pub fn subscribe(&self) -> watch::Receiver<HeartbeatOutcome> {
        self.outcome.clone()
    }

    /// Resolves as soon as the outcome changes away from `Holding` (lost or
    /// stopped), for use in a `tokio::select!` alongside fetch work.
    pub async fn changed(&mut self) -> HeartbeatOutcome {
        while *self.outcome.borrow() == HeartbeatOutcome::Holding {
            if self.outcome.changed().await.is_err() {
                break;
            }
        }
        *self.outcome.borrow()
    }

    /// Stops the heartbeat task and waits for it to exit, returning the
    /// handle in its latest renewed state (the version the caller must use
    /// to release the lock — renewals bump the version, so the handle
    /// passed into `spawn` is stale by the time the run ends).
    pub async fn shutdown(self) -> LockHandle {
        self.cancel.cancel();
        self.join.await.expect("heartbeat task panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemahub_kvstore::testing::InMemoryKvStore;

    #[tokio::test(start_paused = true)]
    async fn renews_periodically_while_holding() {
        let store = Arc::new(InMemoryKvStore::new());
        let lock = Arc::new(DistributedLock::new(store));
        let handle = lock.acquire("p", "worker", Duration::from_secs(4)).await.unwrap();

        let cancel = CancellationToken::new();
        let mut hb = Heartbeat::spawn(lock.clone(), handle, Duration::from_secs(4), cancel.clone());

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(hb.outcome(), HeartbeatOutcome::Holding);

        hb.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lost_lock_is_observable_via_changed() {
        let store = Arc::new(InMemoryKvStore::new());
        let lock = Arc::new(DistributedLock::new(store));
        let handle = lock.acquire("p", "worker", Duration::from_secs(4)).await.unwrap();

        // Someone else force-releases and re-acquires underneath us by
        // deleting the record directly via a second acquire after expiry
        // simulation: simplest reliable way here is to release then
        // re-acquire with a different holder, invalidating our version.
        lock.release(&handle).await.unwrap();
        let _other = lock.acquire("p", "intruder", Duration::from_secs(30)).await.unwrap();

        let cancel = CancellationToken::new();
        let mut hb = Heartbeat::spawn(lock, handle, Duration::from_secs(4), cancel);

        let outcome = hb.changed().await;
        assert_eq!(outcome, HeartbeatOutcome::Lost);
    }
}

//! Per-product work queue of `CursorTarget`s with dynamic discovery
//! (`spec.md` §4.6 "Work queue"). Chunk workers pop a target, may push more
//! (the next page's cursor) or push the same target back (retry), and call
//! `complete` exactly once per successful `pop`. The queue reports itself
//! drained only once nothing is queued AND nothing is in flight, so a
//! worker that is about to discover the next cursor is never mistaken for
//! "done".

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use schemahub_core::model::CursorTarget;
use tokio::sync::Notify;

pub struct WorkQueue {
    items: Mutex<VecDeque<CursorTarget>>,
    in_flight: AtomicUsize,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            in_flight: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    pub fn seed(target: CursorTarget) -> Self {
        let q = Self::new();
        q.push(target);
        q
    }

    pub fn push(&self, target: CursorTarget) {
        self.items.lock().unwrap().push_back(target);
        self.notify.notify_one();
    }

    /// Waits for a target, or returns `None` once the queue is both empty
    /// and nothing is in flight (the run is genuinely done).
    pub async fn pop(&self) -> Option<CursorTarget> {
        loop {
            // Register interest before checking state so a `push` racing
            // this check is never missed (tokio::sync::Notify's documented
            // pattern for this exact race).
            let notified = self.notify.notified();

            {
                let mut items = self.items.lock().unwrap();
                if let Some(item) = items.pop_front() {
                    self.in_flight.fetch_add(1, Ordering::SeqCst);
                    return Some(item);
                }
                if self.in_flight.load(Ordering::SeqCst) == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks one previously-popped target as finished. Must be called
    /// exactly once per `pop`, after any follow-up `push` for that target
    /// (retry or newly discovered cursor) has already happened, so the
    /// in-flight count never dips to zero while replacement work is still
    /// being queued.
    pub fn complete(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0 && self.items.lock().unwrap().is_empty()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pop_returns_none_once_empty_and_idle() {
        let q = WorkQueue::new();
        assert_eq!(q.pop().await, None);
    }

    #[tokio::test]
    async fn pop_waits_for_in_flight_before_reporting_done() {
        let q = std::sync::Arc::new(WorkQueue::seed(CursorTarget::first(0)));
        let t = q.pop().await.unwrap();
        assert_eq!(t.after, 0);

        // Queue is empty but one item is in flight: a concurrent pop must
        // not see `None` yet.
        let q2 = q.clone();
        let waiter = tokio::spawn(async move { q2.pop().await });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        q.push(CursorTarget::first(100));
        q.complete();

        let popped = waiter.await.unwrap();
        assert_eq!(popped.unwrap().after, 100);
    }

    #[tokio::test]
    async fn retry_round_trips_attempts() {
        let q = WorkQueue::seed(CursorTarget::first(5));
        let t = q.pop().await.unwrap();
        q.push(t.retry());
        q.complete();

        let t2 = q.pop().await.unwrap();
        assert_eq!(t2.attempts, 1);
    }
}

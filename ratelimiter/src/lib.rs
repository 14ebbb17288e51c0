//! Shared token-bucket rate limiter. `spec.md` §4.1.
//!
//! One instance is constructed at orchestrator entry and shared (via `Arc`)
//! across every product worker and chunk worker in a process — the same
//! "construct once, inject down" shape the teacher uses for its
//! `SessionStore`/`MarketViewStore` singletons.

mod error;

pub use error::RateLimiterError;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Tunable parameters, `spec.md` §4.1 "Parameters".
#[derive(Clone, Copy, Debug)]
pub struct RateLimiterConfig {
    /// Tokens refilled per second.
    pub rate: f64,
    /// Bucket capacity. Typically `ceil(rate * burst_multiplier)`.
    pub burst: f64,
}

impl RateLimiterConfig {
    pub fn new(rate: f64, burst_multiplier: f64) -> Self {
        Self {
            rate,
            burst: (rate * burst_multiplier).ceil(),
        }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Thread/task-safe token bucket. `acquire` blocks the caller until enough
/// tokens are available, honoring cancellation mid-wait.
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            state: Mutex::new(BucketState {
                tokens: cfg.burst,
                last_refill: Instant::now(),
            }),
        })
    }

    pub fn config(&self) -> RateLimiterConfig {
        self.cfg
    }

    /// Blocks until `n` tokens are available, then removes them.
    ///
    /// Fair in the sense that each waiting caller recomputes and sleeps for
    /// its own deficit under the mutex; spurious wakeups simply cause a
    /// caller to re-check rather than violate fairness, matching `spec.md`'s
    /// "approximately FIFO... subject to spurious wakeups".
    #[instrument(skip(self, cancel), fields(n))]
    pub async fn acquire(&self, n: u32, cancel: &CancellationToken) -> Result<(), RateLimiterError> {
        let n = n as f64;
        if n > self.cfg.burst {
            return Err(RateLimiterError::RequestExceedsBurst {
                requested: n as u32,
                burst: self.cfg.burst,
            });
        }

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill_locked(&mut state);

                if state.tokens >= n {
                    state.tokens -= n;
                    debug!(remaining = state.tokens, "tokens acquired");
                    return Ok(());
                }

                Duration::from_secs_f64((n - state.tokens) / self.cfg.rate)
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => return Err(RateLimiterError::Cancelled),
            }
        }
    }

    fn refill_locked(&self, state: &mut BucketState) {
        let now = Instant::now();
        // Clamp to zero: a clock source going backward (or a mocked clock in
        // tests) must never hand out negative elapsed time.
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.cfg.rate).min(self.cfg.burst);
        state.last_refill = now;
    }
}

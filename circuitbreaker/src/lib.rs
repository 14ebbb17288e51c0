//! Distributed circuit breaker + health store, `spec.md` §4.5.
//!
//! State is shared by every worker in every process via the same
//! conditional-write `ConditionalStore` the lock service uses, so
//! transitions converge under concurrent access instead of racing.

mod error;

pub use error::CircuitError;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use schemahub_core::model::{CircuitState, HealthRecord};
use schemahub_kvstore::{ConditionalStore, Expectation, KvError};
use tracing::{info, instrument, warn};

/// Tunable thresholds, `spec.md` §4.5 "States and transitions".
#[derive(Clone, Copy, Debug)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cooldown: Duration,
    /// Smoothing factor for the response-time EMA and the error-rate
    /// approximation of "last-N ratio" (§3 `HealthRecord`). Closer to 1.0
    /// weights recent outcomes more heavily.
    pub ema_alpha: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            cooldown: Duration::from_secs(5 * 60),
            ema_alpha: 0.2,
        }
    }
}

/// Outcome of one upstream attempt, as reported by the fetcher after each
/// adapter call (`spec.md` §4.5 "Classifying outcomes" — `RateLimited` must
/// never be passed here; it does not count as a circuit failure).
#[derive(Clone, Debug)]
pub enum Outcome {
    Success { response_time_ms: u64 },
    Failure { response_time_ms: u64, message: String },
}

/// At most how many optimistic-CAS retries `record_outcome`/probe
/// transitions attempt before giving up and surfacing a backend error.
const MAX_CAS_RETRIES: u32 = 8;

pub struct CircuitBreaker<S: ConditionalStore> {
    store: Arc<S>,
    cfg: CircuitBreakerConfig,
}

fn health_key(source: &str) -> String {
    format!("health:{source}")
}

impl<S: ConditionalStore> CircuitBreaker<S> {
    pub fn new(store: Arc<S>, cfg: CircuitBreakerConfig) -> Self {
        Self { store, cfg }
    }

    async fn load(&self, source: &str) -> Result<(HealthRecord, Option<i64>), CircuitError> {
        match self.store.get(&health_key(source)).await? {
            Some(rec) => {
                let health: HealthRecord = serde_json::from_slice(&rec.value)?;
                Ok((health, Some(rec.version)))
            }
            None => Ok((HealthRecord::fresh(source), None)),
        }
    }

    async fn store_cas(&self, source: &str, version: Option<i64>, health: &HealthRecord) -> Result<(), KvError> {
        let bytes = serde_json::to_vec(health).expect("HealthRecord always serializes");
        let expect = match version {
            Some(v) => Expectation::Version(v),
            None => Expectation::AbsentOrExpired,
        };
        self.store.put_if(&health_key(source), expect, bytes, None).await?;
        Ok(())
    }

    /// Pre-call check (`spec.md` §4.5 "Pre-call check"). Returns the
    /// duration the caller should sleep before attempting the request; `0`
    /// means proceed immediately.
    ///
    /// When the circuit is `OPEN` and the cooldown has elapsed, this
    /// performs the `OPEN -> HALF_OPEN` probe-race CAS (§4.5 "Probe race")
    /// as a side effect: exactly one concurrent caller's CAS wins per
    /// cooldown window and becomes *the* probe (glossary: "the single
    /// attempt admitted in HALF_OPEN"). Every other caller — the CAS loser,
    /// and anyone who simply observes the state already `HALF_OPEN` because
    /// the probe is still in flight — is told to wait, never admitted
    /// alongside the probe.
    #[instrument(skip(self), fields(source))]
    pub async fn wait_time(&self, source: &str) -> Result<Duration, CircuitError> {
        let (health, version) = self.load(source).await?;

        match health.circuit_state {
            CircuitState::Closed => Ok(Duration::ZERO),
            // The probe itself never re-enters `wait_time` before reporting
            // its outcome, so any caller that observes `HALF_OPEN` here is
            // not the probe — it must wait for the probe to resolve the
            // state back to CLOSED or OPEN.
            CircuitState::HalfOpen => Ok(self.cfg.cooldown),
            CircuitState::Open => {
                let opened_at = health.opened_at.unwrap_or_else(Utc::now);
                let elapsed = (Utc::now() - opened_at).to_std().unwrap_or(Duration::ZERO);

                if elapsed < self.cfg.cooldown {
                    return Ok(self.cfg.cooldown - elapsed);
                }

                // Cooldown elapsed: attempt the exclusive transition. The
                // winner becomes the probe and proceeds immediately; a
                // loser (`VersionMismatch`) means another caller already
                // won and is now the probe, so this caller waits out the
                // cooldown again rather than firing a second concurrent
                // request at a circuit still being tested.
                let mut half_open = health.clone();
                half_open.circuit_state = CircuitState::HalfOpen;
                half_open.consecutive_successes = 0;

                match self.store_cas(source, version, &half_open).await {
                    Ok(()) => {
                        info!(source, "circuit transitioned OPEN -> HALF_OPEN (probe)");
                        Ok(Duration::ZERO)
                    }
                    Err(KvError::VersionMismatch(_)) => {
                        info!(source, "lost half-open probe race; waiting for the probe to resolve");
                        Ok(self.cfg.cooldown)
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Records the result of one upstream attempt, applying the state
    /// machine in `spec.md` §4.5. Retries its own CAS write on concurrent
    /// contention — this is read-modify-write over a record every worker in
    /// the fleet may be touching concurrently.
    #[instrument(skip(self, outcome), fields(source))]
    pub async fn record_outcome(&self, source: &str, outcome: Outcome) -> Result<(), CircuitError> {
        for _ in 0..MAX_CAS_RETRIES {
            let (mut health, version) = self.load(source).await?;
            let now = Utc::now();

            let (is_failure, response_time_ms, message) = match &outcome {
                Outcome::Success { response_time_ms } => (false, *response_time_ms, None),
                Outcome::Failure { response_time_ms, message } => (true, *response_time_ms, Some(message.clone())),
            };

            health.avg_response_time_ms =
                health.avg_response_time_ms * (1.0 - self.cfg.ema_alpha) + (response_time_ms as f64) * self.cfg.ema_alpha;
            health.error_rate =
                health.error_rate * (1.0 - self.cfg.ema_alpha) + (if is_failure { 1.0 } else { 0.0 }) * self.cfg.ema_alpha;

            if is_failure {
                health.consecutive_failures += 1;
                health.consecutive_successes = 0;
                health.last_failure_ts = Some(now);
                health.last_error_message = message.map(|m| m.chars().take(512).collect());
            } else {
                health.consecutive_successes += 1;
                health.consecutive_failures = 0;
                health.last_success_ts = Some(now);
            }

            match health.circuit_state {
                CircuitState::Closed => {
                    if is_failure && health.consecutive_failures >= self.cfg.failure_threshold {
                        health.circuit_state = CircuitState::Open;
                        health.opened_at = Some(now);
                        warn!(source, "circuit CLOSED -> OPEN");
                    }
                }
                CircuitState::HalfOpen => {
                    if is_failure {
                        health.circuit_state = CircuitState::Open;
                        health.opened_at = Some(now);
                        warn!(source, "circuit HALF_OPEN -> OPEN (probe failed)");
                    } else if health.consecutive_successes >= self.cfg.success_threshold {
                        health.circuit_state = CircuitState::Closed;
                        health.opened_at = None;
                        info!(source, "circuit HALF_OPEN -> CLOSED");
                    }
                }
                CircuitState::Open => {
                    // A late-arriving outcome for a call issued before the
                    // circuit opened. Counters above still apply; no further
                    // state transition from here.
                }
            }

            match self.store_cas(source, version, &health).await {
                Ok(()) => return Ok(()),
                Err(KvError::VersionMismatch(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(CircuitError::Backend(KvError::VersionMismatch(source.to_string())))
    }

    /// Current health snapshot, for metrics/structured logging.
    pub async fn health(&self, source: &str) -> Result<HealthRecord, CircuitError> {
        Ok(self.load(source).await?.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemahub_kvstore::testing::InMemoryKvStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::task::JoinSet;

    fn breaker() -> CircuitBreaker<InMemoryKvStore> {
        CircuitBreaker::new(Arc::new(InMemoryKvStore::new()), CircuitBreakerConfig::default())
    }

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let cb = breaker();
        for _ in 0..5 {
            cb.record_outcome("coinbase", Outcome::Failure { response_time_ms: 10, message: "boom".into() })
                .await
                .unwrap();
        }
        let health = cb.health("coinbase").await.unwrap();
        assert_eq!(health.circuit_state, CircuitState::Open);
    }

    #[tokio::test]
    async fn stays_closed_below_threshold() {
        let cb = breaker();
        for _ in 0..4 {
            cb.record_outcome("coinbase", Outcome::Failure { response_time_ms: 10, message: "boom".into() })
                .await
                .unwrap();
        }
        let health = cb.health("coinbase").await.unwrap();
        assert_eq!(health.circuit_state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn wait_time_zero_before_cooldown_elapses_is_nonzero_instead() {
        let cb = breaker();
        for _ in 0..5 {
            cb.record_outcome("coinbase", Outcome::Failure { response_time_ms: 10, message: "boom".into() })
                .await
                .unwrap();
        }
        let wait = cb.wait_time("coinbase").await.unwrap();
        assert!(wait > Duration::ZERO, "wait = {wait:?}");
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let cb = breaker();
        for _ in 0..5 {
            cb.record_outcome("coinbase", Outcome::Failure { response_time_ms: 10, message: "boom".into() })
                .await
                .unwrap();
        }

        // Force into half-open directly for the test rather than sleeping
        // out a real 5-minute cooldown.
        let (mut health, version) = cb.load("coinbase").await.unwrap();
        health.circuit_state = CircuitState::HalfOpen;
        health.consecutive_successes = 0;
        cb.store_cas("coinbase", version, &health).await.unwrap();

        for _ in 0..3 {
            cb.record_outcome("coinbase", Outcome::Success { response_time_ms: 10 }).await.unwrap();
        }

        let health = cb.health("coinbase").await.unwrap();
        assert_eq!(health.circuit_state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_reopens_on_any_failure() {
        let cb = breaker();
        for _ in 0..5 {
            cb.record_outcome("coinbase", Outcome::Failure { response_time_ms: 10, message: "boom".into() })
                .await
                .unwrap();
        }
        let (mut health, version) = cb.load("coinbase").await.unwrap();
        health.circuit_state = CircuitState::HalfOpen;
        cb.store_cas("coinbase", version, &health).await.unwrap();

        cb.record_outcome("coinbase", Outcome::Failure { response_time_ms: 10, message: "still broken".into() })
            .await
            .unwrap();

        let health = cb.health("coinbase").await.unwrap();
        assert_eq!(health.circuit_state, CircuitState::Open);
    }

    /// P7: exactly one caller's CAS wins the OPEN -> HALF_OPEN transition
    /// per cooldown window, even under concurrent racers.
    #[tokio::test]
    async fn exactly_one_probe_wins_the_race() {
        let cb = Arc::new(breaker());
        for _ in 0..5 {
            cb.record_outcome("coinbase", Outcome::Failure { response_time_ms: 10, message: "boom".into() })
                .await
                .unwrap();
        }
        // Backdate opened_at so the cooldown has already elapsed.
        let (mut health, version) = cb.load("coinbase").await.unwrap();
        health.opened_at = Some(Utc::now() - chrono::Duration::seconds(600));
        cb.store_cas("coinbase", version, &health).await.unwrap();

        let wins = Arc::new(AtomicUsize::new(0));
        let mut set = JoinSet::new();
        for _ in 0..20 {
            let cb = cb.clone();
            let wins = wins.clone();
            set.spawn(async move {
                // Each racer attempts the same CAS directly (bypassing the
                // "proceed regardless" convenience of `wait_time`) to assert
                // the underlying transition itself is exclusive.
                let (health, version) = cb.load("coinbase").await.unwrap();
                if health.circuit_state != CircuitState::Open {
                    return;
                }
                let mut half_open = health.clone();
                half_open.circuit_state = CircuitState::HalfOpen;
                if cb.store_cas("coinbase", version, &half_open).await.is_ok() {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        while set.join_next().await.is_some() {}
        assert_eq!(wins.load(Ordering::SeqCst), 1);
    }
}

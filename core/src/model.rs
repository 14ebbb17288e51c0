use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{RunId, TradeId};

/// Which side of the book a trade executed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// Immutable trade record produced by the exchange adapter.
///
/// `_source`, `_source_ingest_ts`, and `_raw_payload` are ingestion metadata
/// stamped on by the adapter, not part of the upstream wire format — they
/// exist so the curated layer can trace every row back to its origin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub product_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub time: DateTime<Utc>,
    pub side: Side,

    #[serde(rename = "_source")]
    pub source: String,
    #[serde(rename = "_source_ingest_ts")]
    pub source_ingest_ts: DateTime<Utc>,
    #[serde(rename = "_raw_payload", skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<String>,
}

/// Run mode requested by the caller. `full_refresh` is the only mode
/// permitted to reset a checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    Incremental,
    FullRefresh,
}

/// Ephemeral per-invocation state. Lives only in memory for the lifetime of
/// one orchestrator run; never persisted as a whole (its `cursor` lineage is
/// what gets persisted, via `Watermark`).
#[derive(Clone, Debug)]
pub struct Run {
    pub run_id: RunId,
    pub source: String,
    pub product_id: String,
    pub start_cursor: Option<TradeId>,
    pub target_cursor: Option<TradeId>,
    pub mode: RunMode,
    pub created_at: DateTime<Utc>,
}

impl Run {
    pub fn new(source: impl Into<String>, product_id: impl Into<String>, mode: RunMode) -> Self {
        Self {
            run_id: RunId::new(),
            source: source.into(),
            product_id: product_id.into(),
            start_cursor: None,
            target_cursor: None,
            mode,
            created_at: Utc::now(),
        }
    }
}

/// Per `(source, product_id)` persisted watermark. Monotonicity and
/// corruption checks are enforced by `schemahub-checkpoint`, not by this
/// plain struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub cursor: TradeId,
    pub last_updated: DateTime<Utc>,
}

/// A unit of fetch work: "give me the page of trades after this cursor".
/// Produced by the planner, consumed by chunk workers, re-enqueued on
/// transient failure up to `max_attempts`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorTarget {
    pub after: TradeId,
    pub attempts: u32,
}

impl CursorTarget {
    pub fn first(after: TradeId) -> Self {
        Self { after, attempts: 0 }
    }

    pub fn retry(self) -> Self {
        Self {
            after: self.after,
            attempts: self.attempts + 1,
        }
    }
}

/// Identity of a durable raw object: every field the key schema is a
/// deterministic function of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawObjectKey {
    pub prefix: String,
    pub source: String,
    pub product_id: String,
    pub created_at: DateTime<Utc>,
    pub run_id: RunId,
    pub first_id: TradeId,
    pub last_id: TradeId,
    pub count: u64,
}

impl RawObjectKey {
    /// Renders the bit-exact key schema:
    /// `{prefix}/raw_{source}_trades_{product_id}_{YYYYMMDDTHHMMSSZ}_{run_id}_{first_id}_{last_id}_{count}.jsonl`
    pub fn render(&self) -> String {
        format!(
            "{prefix}/raw_{source}_trades_{product_id}_{ts}_{run_id}_{first_id}_{last_id}_{count}.jsonl",
            prefix = self.prefix.trim_end_matches('/'),
            source = self.source,
            product_id = self.product_id,
            ts = crate::timefmt::key_timestamp(self.created_at),
            run_id = self.run_id,
            first_id = self.first_id,
            last_id = self.last_id,
            count = self.count,
        )
    }

    pub fn checkpoint_key(prefix: &str, source: &str, product_id: &str) -> String {
        format!(
            "{}/checkpoints/{}/{}.json",
            prefix.trim_end_matches('/'),
            source,
            product_id
        )
    }
}

/// Single-row lock record persisted by the distributed lock service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub lock_name: String,
    pub lock_id: uuid::Uuid,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub ttl: DateTime<Utc>,
}

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-source health record. Updated only through the conditional-write
/// semantics of the health store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub source: String,
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub avg_response_time_ms: f64,
    pub error_rate: f64,
    pub last_success_ts: Option<DateTime<Utc>>,
    pub last_failure_ts: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl HealthRecord {
    pub fn fresh(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            circuit_state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            avg_response_time_ms: 0.0,
            error_rate: 0.0,
            last_success_ts: None,
            last_failure_ts: None,
            last_error_message: None,
            opened_at: None,
        }
    }
}

/// Structured, caller-facing outcome of one orchestrator run. Distinct from
/// `Result<_, OrchestratorError>`: even a "successful" invocation (process
/// exit 0) can carry one of several meanings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Advanced {
        from: Option<TradeId>,
        to: TradeId,
        objects_written: u32,
    },
    NoNewData {
        at: Option<TradeId>,
    },
    Skipped {
        reason: String,
    },
}

impl RunOutcome {
    /// All `RunOutcome` variants represent non-failure paths — failures
    /// surface as `Err(OrchestratorError)` instead, never as a
    /// `RunOutcome` variant, so this is always 0.
    pub fn exit_code(&self) -> i32 {
        0
    }
}

//! Run configuration, `spec.md` §6 "Process interface" concretized: every
//! field the process is invoked with, plus the ambient fields (lock TTL,
//! wall-clock ceiling, holder identity) a real deployment needs but the
//! distilled process interface left as "external knowledge".

use std::time::Duration;

use schemahub_core::model::RunMode;

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub source: String,
    pub product_ids: Vec<String>,
    pub mode: RunMode,

    /// Outer product-worker pool size (`spec.md` §5 "Shared resources").
    pub w_p: usize,
    /// Inner chunk-worker pool size per product.
    pub w_c: usize,
    pub page_limit: u32,
    pub flush_trades: usize,
    /// Ambient addition alongside `flush_trades`: `spec.md` §4.6 allows a
    /// "size or byte threshold" but the distilled process interface only
    /// names the trade-count one. Defaults effectively unbounded when the
    /// caller doesn't care about byte-size flushing.
    pub flush_bytes: usize,

    pub rate: f64,
    pub burst_multiplier: f64,
    pub cutoff_minutes: u64,
    pub max_attempts: u32,

    /// Lock lease length; renewed at `ttl / 4` by the heartbeat (`spec.md`
    /// §4.4).
    pub lock_ttl: Duration,
    /// Upper bound on one product's run wall-clock; exceeding it cancels
    /// the in-flight fetch and fails the run (`spec.md` §5 supplement).
    pub wall_clock_ceiling: Duration,
    /// Identity string stamped into `LockRecord.holder` — process/worker
    /// identity, not a domain value.
    pub holder: String,
}

impl RunConfig {
    pub fn cold_start_cutoff(&self) -> Duration {
        Duration::from_secs(self.cutoff_minutes * 60)
    }
}

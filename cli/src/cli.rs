//! Process-interface argument surface, `spec.md` §6 "Process interface".
//!
//! This module's only job is to parse the fields the spec lists (plus the
//! ambient wiring a real deployment needs — database url, object store
//! root, upstream url) and turn them into a `schemahub_orchestrator::RunConfig`
//! and the concrete backends `main` constructs the run against. No ingestion
//! logic lives here.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use schemahub_core::model::RunMode;
use schemahub_orchestrator::RunConfig;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Incremental,
    FullRefresh,
}

impl From<ModeArg> for RunMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Incremental => RunMode::Incremental,
            ModeArg::FullRefresh => RunMode::FullRefresh,
        }
    }
}

/// `spec.md` §6: "The core is invoked with: `source`, `product_id[]` ...,
/// `mode`, `W_p`, `W_c`, `page_limit`, `flush_trades`, `rate`,
/// `burst_multiplier`, `cutoff_minutes`, `max_attempts`." Seed-file parsing
/// (which products to run) remains an external collaborator's concern — the
/// caller passes an explicit, already-resolved `--product-id` list.
#[derive(Debug, Parser)]
#[command(name = "schemahub", version, about = "SchemaHub trade ingestion core")]
pub struct Cli {
    /// Exchange adapter identity, e.g. "coinbase". Stamped into every
    /// `Trade._source` and every raw object key.
    #[arg(long, env = "SCHEMAHUB_SOURCE")]
    pub source: String,

    /// Products to ingest this invocation. No multi-exchange fan-out: one
    /// adapter per invocation (`spec.md` §1 Non-goals).
    #[arg(long = "product-id", value_delimiter = ',', required = true)]
    pub product_ids: Vec<String>,

    #[arg(long, value_enum, default_value = "incremental")]
    pub mode: ModeArg,

    /// Outer product-worker pool size.
    #[arg(long, default_value_t = 5)]
    pub w_p: usize,

    /// Inner chunk-worker pool size, per product.
    #[arg(long, default_value_t = 9)]
    pub w_c: usize,

    #[arg(long, default_value_t = 1000)]
    pub page_limit: u32,

    #[arg(long, default_value_t = 100_000)]
    pub flush_trades: usize,

    /// Ambient addition alongside `flush_trades`: an optional byte-size
    /// flush threshold. Unbounded (trade-count only) when omitted.
    #[arg(long)]
    pub flush_bytes: Option<usize>,

    #[arg(long, default_value_t = 10.0)]
    pub rate: f64,

    #[arg(long, default_value_t = 1.5)]
    pub burst_multiplier: f64,

    #[arg(long, default_value_t = 45)]
    pub cutoff_minutes: u64,

    #[arg(long, default_value_t = 10)]
    pub max_attempts: u32,

    /// Lock lease length; renewed at `ttl / 4` by the orchestrator's
    /// heartbeat.
    #[arg(long, default_value_t = 30)]
    pub lock_ttl_secs: u64,

    /// Per-product wall-clock ceiling.
    #[arg(long, default_value_t = 1800)]
    pub wall_clock_ceiling_secs: u64,

    /// Per-request HTTP deadline (`spec.md` §5 "Timeouts").
    #[arg(long, default_value_t = 15)]
    pub request_timeout_secs: u64,

    /// Process identity stamped into `LockRecord.holder`. Defaults to a
    /// fresh per-invocation id when not supplied.
    #[arg(long, env = "HOSTNAME")]
    pub holder: Option<String>,

    /// Base URL of the upstream exchange API.
    #[arg(long, env = "SCHEMAHUB_UPSTREAM_URL")]
    pub upstream_url: String,

    /// Stamp `_raw_payload` with the re-serialized wire trade on every row.
    #[arg(long)]
    pub capture_raw_payload: bool,

    /// Object-store root. A local filesystem directory in this binary's
    /// `FsObjectStore`-backed deployment; the same trait also admits a
    /// remote object-store implementation without touching the core.
    #[arg(long, env = "SCHEMAHUB_OBJECT_STORE_ROOT")]
    pub object_store_root: PathBuf,

    /// Key prefix under the object store root (`spec.md` §3 key schema's
    /// `{prefix}`).
    #[arg(long, env = "SCHEMAHUB_PREFIX", default_value = "schemahub")]
    pub prefix: String,

    /// Connection string for the conditional KV store backing locks and
    /// circuit-breaker health (`sqlx::AnyPool`: sqlite or postgres).
    #[arg(long, env = "SCHEMAHUB_DATABASE_URL")]
    pub database_url: String,

    /// Emit JSON-formatted logs instead of the human-readable default.
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    pub fn holder_identity(&self) -> String {
        self.holder
            .clone()
            .unwrap_or_else(|| format!("schemahub-cli-{}", uuid::Uuid::new_v4()))
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            source: self.source.clone(),
            product_ids: self.product_ids.clone(),
            mode: self.mode.into(),
            w_p: self.w_p,
            w_c: self.w_c,
            page_limit: self.page_limit,
            flush_trades: self.flush_trades,
            flush_bytes: self.flush_bytes.unwrap_or(usize::MAX),
            rate: self.rate,
            burst_multiplier: self.burst_multiplier,
            cutoff_minutes: self.cutoff_minutes,
            max_attempts: self.max_attempts,
            lock_ttl: Duration::from_secs(self.lock_ttl_secs),
            wall_clock_ceiling: Duration::from_secs(self.wall_clock_ceiling_secs),
            holder: self.holder_identity(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_arg_maps_onto_run_mode() {
        assert_eq!(RunMode::from(ModeArg::Incremental), RunMode::Incremental);
        assert_eq!(RunMode::from(ModeArg::FullRefresh), RunMode::FullRefresh);
    }

    #[test]
    fn parses_minimal_required_arguments() {
        let cli = Cli::parse_from([
            "schemahub",
            "--source",
            "coinbase",
            "--product-id",
            "BTC-USD,ETH-USD",
            "--upstream-url",
            "https://api.exchange.example/v1",
            "--object-store-root",
            "/tmp/schemahub-raw",
            "--database-url",
            "sqlite::memory:",
        ]);

        assert_eq!(cli.source, "coinbase");
        assert_eq!(cli.product_ids, vec!["BTC-USD".to_string(), "ETH-USD".to_string()]);
        assert_eq!(cli.w_p, 5);
        assert_eq!(cli.w_c, 9);
        assert_eq!(cli.page_limit, 1000);

        let cfg = cli.run_config();
        assert_eq!(cfg.mode, RunMode::Incremental);
        assert_eq!(cfg.product_ids.len(), 2);
    }

    #[test]
    fn holder_falls_back_to_generated_identity_when_unset() {
        let cli = Cli::parse_from([
            "schemahub",
            "--source",
            "coinbase",
            "--product-id",
            "BTC-USD",
            "--upstream-url",
            "https://api.exchange.example/v1",
            "--object-store-root",
            "/tmp/schemahub-raw",
            "--database-url",
            "sqlite::memory:",
        ]);
        assert!(cli.holder.is_none());
        assert!(cli.holder_identity().starts_with("schemahub-cli-"));
    }
}

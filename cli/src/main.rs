//! `schemahub` binary: the thin process-interface surface for the
//! ingestion core (`spec.md` §6). Parses arguments, constructs every shared
//! singleton exactly once, and hands them down to the orchestrator — no
//! ingestion logic lives in this crate (`spec.md` §9 "Implicit globals ->
//! explicit, injected dependencies").

mod cli;

use std::sync::Arc;

use clap::Parser;
use schemahub_adapter::HttpExchangeAdapter;
use schemahub_checkpoint::CheckpointManager;
use schemahub_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use schemahub_kvstore::SqlxKvStore;
use schemahub_lock::DistributedLock;
use schemahub_objectstore::FsObjectStore;
use schemahub_orchestrator::{exit_code, run_all, OrchestratorDeps};
use schemahub_ratelimiter::{RateLimiter, RateLimiterConfig};
use schemahub_writer::RawWriter;
use tracing::info;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    schemahub_common::logger::init_tracing("schemahub-cli", cli.json_logs);

    let cfg = Arc::new(cli.run_config());

    let adapter = Arc::new(
        HttpExchangeAdapter::new(cli.upstream_url.as_str(), cli.source.as_str(), cli.request_timeout())?
            .with_raw_payload_capture(cli.capture_raw_payload),
    );

    let kv = Arc::new(SqlxKvStore::connect(&cli.database_url).await?);
    kv.migrate().await?;

    let raw_store = FsObjectStore::new(cli.object_store_root.clone());
    let checkpoint_store = FsObjectStore::new(cli.object_store_root.clone());

    let deps = Arc::new(OrchestratorDeps {
        lock: Arc::new(DistributedLock::new(kv.clone())),
        checkpoint: Arc::new(CheckpointManager::new(checkpoint_store, cli.prefix.clone())),
        circuit: Arc::new(CircuitBreaker::new(kv, CircuitBreakerConfig::default())),
        rate_limiter: RateLimiter::new(RateLimiterConfig::new(cli.rate, cli.burst_multiplier)),
        adapter,
        writer: Arc::new(RawWriter::new(raw_store, cli.prefix.clone())),
    });

    info!(
        source = %cfg.source,
        products = cfg.product_ids.len(),
        w_p = cfg.w_p,
        w_c = cfg.w_c,
        mode = ?cfg.mode,
        "starting ingestion run"
    );

    let results = run_all(deps, cfg).await;
    for result in &results {
        match &result.outcome {
            Ok(outcome) => info!(product_id = %result.product_id, ?outcome, "run outcome"),
            Err(e) => tracing::error!(product_id = %result.product_id, error = %e, "run failed"),
        }
    }

    std::process::exit(exit_code(&results));
}

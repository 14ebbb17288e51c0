//! End-to-end product-run scenarios against fully in-memory fakes — no
//! network, no real database, the same "fakes over mocks, full run through
//! the real orchestration code" shape the fetcher's own lib.rs tests use.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use schemahub_adapter::testing::{FakeExchangeAdapter, ScriptedResponse};
use schemahub_adapter::AdapterError;
use schemahub_checkpoint::CheckpointManager;
use schemahub_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use schemahub_core::model::{RunMode, RunOutcome, Side, Trade};
use schemahub_kvstore::testing::InMemoryKvStore;
use schemahub_lock::DistributedLock;
use schemahub_objectstore::testing::InMemoryObjectStore;
use schemahub_orchestrator::{run_single_product, OrchestratorDeps, OrchestratorError, RunConfig};
use schemahub_ratelimiter::{RateLimiter, RateLimiterConfig};
use schemahub_writer::RawWriter;

fn trade(id: u64) -> Trade {
    Trade {
        trade_id: id,
        product_id: "BTC-USD".to_string(),
        price: Decimal::new(100, 0),
        size: Decimal::new(1, 0),
        time: Utc::now(),
        side: Side::Buy,
        source: "coinbase".to_string(),
        source_ingest_ts: Utc::now(),
        raw_payload: None,
    }
}

fn deps(adapter: Arc<FakeExchangeAdapter>) -> OrchestratorDeps<FakeExchangeAdapter, InMemoryObjectStore, InMemoryKvStore> {
    let kv = Arc::new(InMemoryKvStore::new());
    OrchestratorDeps {
        lock: Arc::new(DistributedLock::new(kv.clone())),
        checkpoint: Arc::new(CheckpointManager::new(InMemoryObjectStore::new(), "s3://bucket/raw")),
        circuit: Arc::new(CircuitBreaker::new(kv, CircuitBreakerConfig::default())),
        rate_limiter: RateLimiter::new(RateLimiterConfig::new(1000.0, 2.0)),
        adapter,
        writer: Arc::new(RawWriter::new(InMemoryObjectStore::new(), "s3://bucket/raw")),
    }
}

fn cfg(mode: RunMode) -> RunConfig {
    RunConfig {
        source: "coinbase".to_string(),
        product_ids: vec!["BTC-USD".to_string()],
        mode,
        w_p: 2,
        w_c: 4,
        page_limit: 100,
        flush_trades: 10_000,
        flush_bytes: usize::MAX,
        rate: 1000.0,
        burst_multiplier: 2.0,
        cutoff_minutes: 60,
        max_attempts: 5,
        lock_ttl: Duration::from_secs(30),
        wall_clock_ceiling: Duration::from_secs(30),
        holder: "test-worker".to_string(),
    }
}

/// S1: fresh product, no checkpoint, full history fetched in one run.
#[tokio::test]
async fn fresh_product_fetches_full_history() {
    let adapter = Arc::new(FakeExchangeAdapter::new());
    adapter.seed("BTC-USD", (1..=1000u64).map(trade).collect());
    let deps = deps(adapter);
    let cfg = cfg(RunMode::Incremental);

    let outcome = run_single_product(&deps, &cfg, "BTC-USD").await.unwrap();
    match outcome {
        RunOutcome::Advanced { from, to, objects_written } => {
            assert_eq!(from, None);
            assert_eq!(to, 1000);
            assert!(objects_written >= 1);
        }
        other => panic!("expected Advanced, got {other:?}"),
    }

    assert_eq!(deps.checkpoint.load("coinbase", "BTC-USD").await.unwrap(), Some(1000));
}

/// S2: checkpoint already at 1000, adapter has trades up to 1500.
#[tokio::test]
async fn resumes_from_existing_checkpoint() {
    let adapter = Arc::new(FakeExchangeAdapter::new());
    adapter.seed("BTC-USD", (1..=1500u64).map(trade).collect());
    let deps = deps(adapter);
    deps.checkpoint.save("coinbase", "BTC-USD", 1000).await.unwrap();
    let cfg = cfg(RunMode::Incremental);

    let outcome = run_single_product(&deps, &cfg, "BTC-USD").await.unwrap();
    match outcome {
        RunOutcome::Advanced { from, to, .. } => {
            assert_eq!(from, Some(1000));
            assert_eq!(to, 1500);
        }
        other => panic!("expected Advanced, got {other:?}"),
    }
}

/// S3: transient 429s on a couple of cursors are retried to completion.
#[tokio::test]
async fn retries_transient_rate_limit_errors_to_completion() {
    let adapter = Arc::new(FakeExchangeAdapter::new());
    adapter.seed("BTC-USD", (1..=500u64).map(trade).collect());
    adapter.script("BTC-USD", 0, ScriptedResponse::Err(AdapterError::RateLimited));
    let deps = deps(adapter);
    let cfg = cfg(RunMode::Incremental);

    let outcome = run_single_product(&deps, &cfg, "BTC-USD").await.unwrap();
    match outcome {
        RunOutcome::Advanced { to, .. } => assert_eq!(to, 500),
        other => panic!("expected Advanced, got {other:?}"),
    }
}

/// S4: a fatal client error leaves the checkpoint untouched and writes
/// nothing.
#[tokio::test]
async fn fatal_error_leaves_checkpoint_untouched() {
    let adapter = Arc::new(FakeExchangeAdapter::new());
    adapter.seed("BTC-USD", (1..=500u64).map(trade).collect());
    adapter.script("BTC-USD", 0, ScriptedResponse::Err(AdapterError::ClientError { status: 404 }));
    let deps = deps(adapter);
    let cfg = cfg(RunMode::Incremental);

    let err = run_single_product(&deps, &cfg, "BTC-USD").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Fetch(_)));
    assert_eq!(deps.checkpoint.load("coinbase", "BTC-USD").await.unwrap(), None);
}

/// S5: a second run against an already-held lock is skipped, not failed.
#[tokio::test]
async fn concurrent_run_on_held_lock_is_skipped() {
    let adapter = Arc::new(FakeExchangeAdapter::new());
    adapter.seed("BTC-USD", (1..=10u64).map(trade).collect());
    let deps = deps(adapter);
    let cfg = cfg(RunMode::Incremental);

    let _held = deps.lock.acquire("product:coinbase:BTC-USD", "someone-else", Duration::from_secs(30)).await.unwrap();

    let outcome = run_single_product(&deps, &cfg, "BTC-USD").await.unwrap();
    assert!(matches!(outcome, RunOutcome::Skipped { .. }));
    assert_eq!(deps.checkpoint.load("coinbase", "BTC-USD").await.unwrap(), None);
}

/// Already caught up to head: no new data, exit success.
#[tokio::test]
async fn already_caught_up_reports_no_new_data() {
    let adapter = Arc::new(FakeExchangeAdapter::new());
    adapter.seed("BTC-USD", (1..=10u64).map(trade).collect());
    let deps = deps(adapter);
    deps.checkpoint.save("coinbase", "BTC-USD", 10).await.unwrap();
    let cfg = cfg(RunMode::Incremental);

    let outcome = run_single_product(&deps, &cfg, "BTC-USD").await.unwrap();
    assert!(matches!(outcome, RunOutcome::NoNewData { at: Some(10) }));
}

/// Full refresh resets the checkpoint before replanning from scratch.
#[tokio::test]
async fn full_refresh_resets_and_refetches_everything() {
    let adapter = Arc::new(FakeExchangeAdapter::new());
    adapter.seed("BTC-USD", (1..=200u64).map(trade).collect());
    let deps = deps(adapter);
    deps.checkpoint.save("coinbase", "BTC-USD", 200).await.unwrap();
    let cfg = cfg(RunMode::FullRefresh);

    let outcome = run_single_product(&deps, &cfg, "BTC-USD").await.unwrap();
    match outcome {
        RunOutcome::Advanced { from, to, .. } => {
            assert_eq!(from, None);
            assert_eq!(to, 200);
        }
        other => panic!("expected Advanced, got {other:?}"),
    }
}

/// Releasing the lock on exit means a second sequential run can proceed.
#[tokio::test]
async fn lock_is_released_after_a_clean_run() {
    let adapter = Arc::new(FakeExchangeAdapter::new());
    adapter.seed("BTC-USD", (1..=10u64).map(trade).collect());
    let deps = deps(adapter);
    let cfg = cfg(RunMode::Incremental);

    run_single_product(&deps, &cfg, "BTC-USD").await.unwrap();
    let outcome = run_single_product(&deps, &cfg, "BTC-USD").await.unwrap();
    assert!(matches!(outcome, RunOutcome::NoNewData { at: Some(10) }));
}

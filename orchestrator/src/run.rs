//! Per-product run pipeline, `spec.md` §2's 7-step data flow: acquire lock,
//! load checkpoint, plan/fetch/write/advance via `schemahub-fetcher`,
//! release lock on exit regardless of outcome.

use chrono::Utc;
use schemahub_adapter::ExchangeAdapter;
use schemahub_core::ids::RunId;
use schemahub_core::model::{RunMode, RunOutcome};
use schemahub_fetcher::{FetchDeps, FetchOutcome, FetchParams};
use schemahub_kvstore::ConditionalStore;
use schemahub_lock::{product_lock_name, Heartbeat, HeartbeatOutcome, LockError};
use schemahub_objectstore::ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::checkpoint_sink::CheckpointAdvanceSink;
use crate::config::RunConfig;
use crate::deps::OrchestratorDeps;
use crate::error::OrchestratorError;
use crate::retry::with_store_retry_or_exhausted;

#[instrument(skip(deps, cfg), fields(source = %cfg.source, product_id))]
pub async fn run_single_product<A, O, S>(
    deps: &OrchestratorDeps<A, O, S>,
    cfg: &RunConfig,
    product_id: &str,
) -> Result<RunOutcome, OrchestratorError>
where
    A: ExchangeAdapter + 'static,
    O: ObjectStore + 'static,
    S: ConditionalStore + 'static,
{
    let lock_name = product_lock_name(&cfg.source, product_id);

    let handle = match with_store_retry_or_exhausted(|| deps.lock.acquire(&lock_name, &cfg.holder, cfg.lock_ttl)).await {
        Ok(handle) => handle,
        Err(OrchestratorError::Lock(LockError::Held(_))) => {
            info!(lock_name, "lock held by another process; skipping");
            return Ok(RunOutcome::Skipped {
                reason: format!("lock {lock_name:?} held by another process"),
            });
        }
        Err(e) => return Err(e),
    };

    let heartbeat_cancel = CancellationToken::new();
    let heartbeat = Heartbeat::spawn(deps.lock.clone(), handle, cfg.lock_ttl, heartbeat_cancel.clone());
    let lock_watch = heartbeat.subscribe();

    let result = run_with_lock_held(deps, cfg, product_id, &lock_name, lock_watch).await;

    let latest_handle = heartbeat.shutdown().await;
    if let Err(e) = deps.lock.release(&latest_handle).await {
        warn!(lock_name, error = %e, "failed to release lock on exit; it will reclaim via TTL");
    }

    result
}

async fn run_with_lock_held<A, O, S>(
    deps: &OrchestratorDeps<A, O, S>,
    cfg: &RunConfig,
    product_id: &str,
    lock_name: &str,
    mut lock_watch: tokio::sync::watch::Receiver<HeartbeatOutcome>,
) -> Result<RunOutcome, OrchestratorError>
where
    A: ExchangeAdapter + 'static,
    O: ObjectStore + 'static,
    S: ConditionalStore + 'static,
{
    if cfg.mode == RunMode::FullRefresh {
        with_store_retry_or_exhausted(|| deps.checkpoint.reset(&cfg.source, product_id)).await?;
    }

    let start = with_store_retry_or_exhausted(|| deps.checkpoint.load(&cfg.source, product_id)).await?;

    let sink = CheckpointAdvanceSink::new(&*deps.checkpoint, cfg.source.clone(), product_id.to_string(), lock_watch.clone());

    let fetch_deps = FetchDeps {
        adapter: deps.adapter.clone(),
        rate_limiter: deps.rate_limiter.clone(),
        circuit: deps.circuit.clone(),
        writer: deps.writer.clone(),
    };
    let params = FetchParams {
        w_c: cfg.w_c,
        page_limit: cfg.page_limit,
        max_attempts: cfg.max_attempts,
        flush_trades: cfg.flush_trades,
        flush_bytes: cfg.flush_bytes,
        cold_start_cutoff: cfg.cold_start_cutoff(),
    };

    let run_id = RunId::new();
    let created_at = Utc::now();
    let run_cancel = CancellationToken::new();

    let fetch_fut = schemahub_fetcher::run_product_fetch(
        &fetch_deps,
        &sink,
        &cfg.source,
        product_id,
        run_id,
        created_at,
        start,
        cfg.mode,
        &params,
        run_cancel.clone(),
    );
    tokio::pin!(fetch_fut);

    let lock_lost = async {
        loop {
            if *lock_watch.borrow() == HeartbeatOutcome::Lost {
                break;
            }
            if lock_watch.changed().await.is_err() {
                break;
            }
        }
    };

    let outcome = tokio::select! {
        outcome = &mut fetch_fut => Ok(outcome),
        _ = lock_lost => {
            warn!(lock_name, "lock lost mid-run; aborting before any further write");
            run_cancel.cancel();
            let _ = fetch_fut.await;
            Err(OrchestratorError::LockLostMidRun { lock_name: lock_name.to_string() })
        }
        _ = tokio::time::sleep(cfg.wall_clock_ceiling) => {
            warn!(lock_name, ceiling_secs = cfg.wall_clock_ceiling.as_secs(), "wall-clock ceiling exceeded");
            run_cancel.cancel();
            let _ = fetch_fut.await;
            Err(OrchestratorError::WallClockExceeded)
        }
    }?;

    match outcome {
        FetchOutcome::NoNewData => Ok(RunOutcome::NoNewData { at: start }),
        FetchOutcome::Completed { flushes } if flushes.is_empty() => Ok(RunOutcome::NoNewData { at: start }),
        FetchOutcome::Completed { flushes } => {
            let to = flushes.last().expect("non-empty, checked above").last_id;
            Ok(RunOutcome::Advanced {
                from: start,
                to,
                objects_written: flushes.len() as u32,
            })
        }
        FetchOutcome::Failed { error, .. } => Err(error.into()),
    }
}

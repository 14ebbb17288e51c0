//! Two-level parallel fetcher, `spec.md` §4.6: plans cursor targets for one
//! product, runs them through a bounded pool of chunk workers (the inner
//! level — the outer product-worker level lives in the orchestrator, which
//! calls [`run_product_fetch`] once per product and bounds how many run
//! concurrently), and assembles completed pages into flushed raw objects.

mod aggregator;
mod error;
mod planner;
mod queue;
mod worker;

pub use error::FetcherError;
pub use planner::cold_start_boundary;

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemahub_adapter::ExchangeAdapter;
use schemahub_circuitbreaker::CircuitBreaker;
use schemahub_core::ids::{RunId, TradeId};
use schemahub_core::model::{CursorTarget, RawObjectKey, RunMode};
use schemahub_kvstore::ConditionalStore;
use schemahub_objectstore::ObjectStore;
use schemahub_ratelimiter::RateLimiter;
use schemahub_writer::RawWriter;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use aggregator::Aggregator;
use queue::WorkQueue;
use worker::StepOutcome;

/// Bounds how many times `run_product_fetch` re-probes `head` after a clean
/// drain and extends the batch with newly arrived trades, so a
/// fast-moving product can't keep the fetcher spinning indefinitely — any
/// remainder is simply picked up by the next run.
const MAX_REPROBE_ROUNDS: u32 = 8;

/// Everything a product fetch needs from the rest of the core, injected so
/// the fetcher itself never constructs a client, a pool, or a store.
pub struct FetchDeps<A: ExchangeAdapter, O: ObjectStore, S: ConditionalStore> {
    pub adapter: Arc<A>,
    pub rate_limiter: Arc<RateLimiter>,
    pub circuit: Arc<CircuitBreaker<S>>,
    pub writer: Arc<RawWriter<O>>,
}

/// Tunables, `spec.md` §4.6 "Parameters" / §8 process interface.
#[derive(Clone, Copy, Debug)]
pub struct FetchParams {
    /// Inner-level chunk-worker pool size for this product.
    pub w_c: usize,
    pub page_limit: u32,
    pub max_attempts: u32,
    pub flush_trades: usize,
    pub flush_bytes: usize,
    /// Cold-start time cutoff: how far back a run with no checkpoint is
    /// allowed to reach.
    pub cold_start_cutoff: Duration,
}

/// Callback the orchestrator implements to advance the persisted
/// checkpoint once a flush lands durably. Kept as a trait (not a direct
/// `schemahub-checkpoint` dependency) so the fetcher stays testable against
/// fakes without pulling in checkpoint-file concerns.
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    async fn advance(&self, to: TradeId) -> Result<(), FetcherError>;
}

/// One successful raw-object write, with the checkpoint value it unlocked.
#[derive(Clone, Debug)]
pub struct FlushedBatch {
    pub key: RawObjectKey,
    pub first_id: TradeId,
    pub last_id: TradeId,
    pub count: u64,
}

/// Terminal result of one product's fetch. Never itself a `Result` — even
/// `Failed` carries whatever flushed (and therefore checkpointed) safely
/// before the failure, since each flush is its own all-or-nothing batch
/// boundary (`spec.md` §4.6 "All-or-nothing semantics").
#[derive(Debug)]
pub enum FetchOutcome {
    /// The queue drained cleanly; `flushes` may be empty if nothing new was
    /// found between `start` and `head`.
    Completed { flushes: Vec<FlushedBatch> },
    /// Nothing to do at all (no history, or already caught up to `head`).
    NoNewData,
    /// A fatal cursor error (or a flush/advance failure) abandoned the
    /// current in-progress batch. `flushes` lists what had already landed
    /// durably before the failure.
    Failed { error: FetcherError, flushes: Vec<FlushedBatch> },
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip(deps, checkpoint_sink, params, cancel), fields(source, product_id, run_id = %run_id))]
pub async fn run_product_fetch<A, O, S>(
    deps: &FetchDeps<A, O, S>,
    checkpoint_sink: &dyn CheckpointSink,
    source: &str,
    product_id: &str,
    run_id: RunId,
    created_at: DateTime<Utc>,
    start: Option<TradeId>,
    mode: RunMode,
    params: &FetchParams,
    cancel: CancellationToken,
) -> FetchOutcome
where
    A: ExchangeAdapter + 'static,
    O: ObjectStore + 'static,
    S: ConditionalStore + 'static,
{
    let now = Utc::now();

    let head = match deps.adapter.head(product_id).await {
        Ok(h) => h,
        Err(e) => return FetchOutcome::Failed { error: e.into(), flushes: Vec::new() },
    };

    if head == 0 {
        return FetchOutcome::NoNewData;
    }

    let effective_start = match start {
        Some(s) => s,
        None => {
            match planner::cold_start_boundary(&*deps.adapter, product_id, head, now, params.cold_start_cutoff, params.page_limit).await
            {
                Ok(boundary) => boundary,
                Err(e) => return FetchOutcome::Failed { error: e, flushes: Vec::new() },
            }
        }
    };

    // `mode` doesn't change fetch mechanics here: a full-refresh run simply
    // arrives with `start = None` because the caller already reset the
    // checkpoint before invoking this function.
    let _ = mode;

    if effective_start >= head {
        return FetchOutcome::NoNewData;
    }

    let queue = Arc::new(WorkQueue::seed(CursorTarget::first(effective_start)));
    let fatal: Arc<StdMutex<Option<FetcherError>>> = Arc::new(StdMutex::new(None));
    let local_cancel = cancel.child_token();
    let mut aggregator = Aggregator::new(params.flush_trades, params.flush_bytes);
    let mut flushes = Vec::new();
    let mut current_end = head;

    'rounds: for round in 0..=MAX_REPROBE_ROUNDS {
        let (tx, mut rx) = mpsc::channel::<Vec<schemahub_core::model::Trade>>(params.w_c.max(1) * 2);

        let mut workers = JoinSet::new();
        for _ in 0..params.w_c.max(1) {
            let queue = queue.clone();
            let fatal = fatal.clone();
            let tx = tx.clone();
            let adapter = deps.adapter.clone();
            let rate_limiter = deps.rate_limiter.clone();
            let circuit = deps.circuit.clone();
            let source = source.to_string();
            let product_id = product_id.to_string();
            let cancel = local_cancel.clone();
            let max_attempts = params.max_attempts;
            let page_limit = params.page_limit;

            workers.spawn(async move {
                loop {
                    if cancel.is_cancelled() || fatal.lock().unwrap().is_some() {
                        break;
                    }
                    let Some(target) = queue.pop().await else { break };
                    match worker::process_one(
                        &*adapter,
                        &rate_limiter,
                        &circuit,
                        &source,
                        &product_id,
                        &cancel,
                        max_attempts,
                        page_limit,
                        target,
                    )
                    .await
                    {
                        StepOutcome::Advanced { trades, discovered_next } => {
                            if let Some(next) = discovered_next {
                                queue.push(CursorTarget::first(next));
                            }
                            if !trades.is_empty() && tx.send(trades).await.is_err() {
                                // Receiver gone (coordinator already failed);
                                // nothing left to do with this page.
                            }
                            queue.complete();
                        }
                        StepOutcome::Requeue(t) => {
                            queue.push(t);
                            queue.complete();
                        }
                        StepOutcome::Fatal(e) => {
                            *fatal.lock().unwrap() = Some(e);
                            queue.complete();
                            break;
                        }
                    }
                }
            });
        }
        drop(tx);

        while let Some(trades) = rx.recv().await {
            aggregator.ingest(trades);
            if aggregator.should_flush() {
                match flush(deps, checkpoint_sink, source, product_id, run_id, created_at, &mut aggregator).await {
                    Ok(batch) => flushes.push(batch),
                    Err(e) => {
                        *fatal.lock().unwrap() = Some(e);
                        local_cancel.cancel();
                    }
                }
            }
        }

        while workers.join_next().await.is_some() {}

        if let Some(error) = fatal.lock().unwrap().take() {
            return FetchOutcome::Failed { error, flushes };
        }

        if !aggregator.is_empty() {
            match flush(deps, checkpoint_sink, source, product_id, run_id, created_at, &mut aggregator).await {
                Ok(batch) => flushes.push(batch),
                Err(e) => return FetchOutcome::Failed { error: e, flushes },
            }
        }

        if round == MAX_REPROBE_ROUNDS {
            warn!(source, product_id, "reprobe round limit reached; leaving remainder for next run");
            break 'rounds;
        }

        let new_head = match deps.adapter.head(product_id).await {
            Ok(h) => h,
            Err(e) => return FetchOutcome::Failed { error: e.into(), flushes },
        };

        if new_head > current_end {
            queue.push(CursorTarget::first(current_end));
            current_end = new_head;
            continue 'rounds;
        }

        break 'rounds;
    }

    info!(source, product_id, flushes = flushes.len(), "product fetch complete");
    FetchOutcome::Completed { flushes }
}

async fn flush<A, O, S>(
    deps: &FetchDeps<A, O, S>,
    checkpoint_sink: &dyn CheckpointSink,
    source: &str,
    product_id: &str,
    run_id: RunId,
    created_at: DateTime<Utc>,
    aggregator: &mut Aggregator,
) -> Result<FlushedBatch, FetcherError>
where
    A: ExchangeAdapter,
    O: ObjectStore,
    S: ConditionalStore,
{
    let trades = aggregator.take();
    let first_id = trades.first().map(|t| t.trade_id).unwrap_or(0);
    let last_id = trades.last().map(|t| t.trade_id).unwrap_or(0);
    let count = trades.len() as u64;

    let key = deps.writer.write(source, product_id, run_id, created_at, &trades).await?;
    checkpoint_sink.advance(last_id).await?;

    Ok(FlushedBatch { key, first_id, last_id, count })
}

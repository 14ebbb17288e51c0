//! Orchestrator, `spec.md` §2: the only crate that owns process-level
//! concerns — constructing the shared singletons once, acquiring locks,
//! and bounding the outer product-worker level of concurrency (`W_p`) that
//! sits above `schemahub-fetcher`'s own inner chunk-worker level (`W_c`).

mod checkpoint_sink;
mod config;
mod deps;
mod error;
mod retry;
mod run;

pub use config::RunConfig;
pub use deps::OrchestratorDeps;
pub use error::OrchestratorError;
pub use run::run_single_product;

use std::sync::Arc;

use schemahub_adapter::ExchangeAdapter;
use schemahub_core::model::RunOutcome;
use schemahub_kvstore::ConditionalStore;
use schemahub_objectstore::ObjectStore;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// One product's outcome, paired with its id since these complete out of
/// submission order under `W_p`-bounded concurrency.
#[derive(Debug)]
pub struct ProductResult {
    pub product_id: String,
    pub outcome: Result<RunOutcome, OrchestratorError>,
}

/// Runs every `product_id` in `cfg.product_ids`, at most `cfg.w_p`
/// concurrently (`spec.md` §5 "Shared resources" — the outer product-worker
/// level). One product failing does not cancel its siblings; each result is
/// reported independently, matching `spec.md` §7's per-run (not per-batch)
/// failure semantics.
#[instrument(skip(deps, cfg))]
pub async fn run_all<A, O, S>(deps: Arc<OrchestratorDeps<A, O, S>>, cfg: Arc<RunConfig>) -> Vec<ProductResult>
where
    A: ExchangeAdapter + 'static,
    O: ObjectStore + 'static,
    S: ConditionalStore + 'static,
{
    let semaphore = Arc::new(Semaphore::new(cfg.w_p.max(1)));
    let mut tasks = JoinSet::new();

    for product_id in cfg.product_ids.clone() {
        let deps = deps.clone();
        let cfg = cfg.clone();
        let semaphore = semaphore.clone();

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            let outcome = run::run_single_product(&deps, &cfg, &product_id).await;
            ProductResult { product_id, outcome }
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                match &result.outcome {
                    Ok(outcome) => info!(product_id = result.product_id, ?outcome, "product run complete"),
                    Err(e) => warn!(product_id = result.product_id, error = %e, "product run failed"),
                }
                results.push(result);
            }
            Err(e) => warn!(error = %e, "product task panicked"),
        }
    }

    results
}

/// Process exit status for a batch of product results (`spec.md` §6 "Exit
/// status": zero on success, non-zero on any run failure; lock contention
/// is its own "skipped" success path, not a failure).
pub fn exit_code(results: &[ProductResult]) -> i32 {
    if results.iter().any(|r| r.outcome.is_err()) {
        1
    } else {
        0
    }
}

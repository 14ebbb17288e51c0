use std::sync::Arc;

use schemahub_adapter::ExchangeAdapter;
use schemahub_checkpoint::CheckpointManager;
use schemahub_circuitbreaker::CircuitBreaker;
use schemahub_kvstore::ConditionalStore;
use schemahub_lock::DistributedLock;
use schemahub_objectstore::ObjectStore;
use schemahub_ratelimiter::RateLimiter;
use schemahub_writer::RawWriter;

/// Every shared singleton a run needs, constructed once (`schemahub-cli`'s
/// job) and threaded down — never rebuilt per product, never ambient
/// global state (`spec.md` §9 "Implicit globals -> explicit, injected
/// dependencies").
pub struct OrchestratorDeps<A: ExchangeAdapter, O: ObjectStore, S: ConditionalStore> {
    pub lock: Arc<DistributedLock<S>>,
    pub checkpoint: Arc<CheckpointManager<O>>,
    pub circuit: Arc<CircuitBreaker<S>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub adapter: Arc<A>,
    pub writer: Arc<RawWriter<O>>,
}

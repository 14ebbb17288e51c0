//! Bounded backoff for `StoreUnavailable`, `spec.md` §7: "Retry with
//! backoff at the orchestrator level (bounded); then fatal." Applied to the
//! handful of calls this crate issues directly against the lock and
//! checkpoint stores (the fetcher's own per-cursor retry budget is a
//! separate concern, driven by `max_attempts`).

use std::future::Future;
use std::time::Duration;

use schemahub_core::{Classify, ErrorKind};

use crate::error::OrchestratorError;

const MAX_STORE_RETRIES: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(100);

/// Converts an exhausted run into
/// `OrchestratorError::StoreUnavailableExhausted` instead of surfacing the
/// raw last error, since `MAX_STORE_RETRIES` is an orchestrator-level
/// policy rather than something the store error type itself knows about.
pub(crate) async fn with_store_retry_or_exhausted<T, E, F, Fut>(op: F) -> Result<T, OrchestratorError>
where
    E: Classify + std::fmt::Display,
    OrchestratorError: From<E>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut op = op;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.kind() == ErrorKind::StoreUnavailable && attempt + 1 < MAX_STORE_RETRIES => {
                attempt += 1;
                tokio::time::sleep(BASE_BACKOFF * 2u32.pow(attempt)).await;
            }
            Err(e) if e.kind() == ErrorKind::StoreUnavailable => {
                return Err(OrchestratorError::StoreUnavailableExhausted {
                    attempts: MAX_STORE_RETRIES,
                    last_error: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }
}

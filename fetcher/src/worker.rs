//! Chunk worker body (`spec.md` §4.6 "Pre-request sequence"): the
//! circuit-breaker check, rate-limiter acquire, adapter call, and
//! circuit-breaker report that happen for every cursor attempt.

use std::time::Duration;

use schemahub_circuitbreaker::{CircuitBreaker, Outcome};
use schemahub_core::ids::TradeId;
use schemahub_core::model::{CursorTarget, Trade};
use schemahub_core::Classify;
use schemahub_kvstore::ConditionalStore;
use schemahub_ratelimiter::{RateLimiter, RateLimiterError};
use schemahub_adapter::{ExchangeAdapter, PageCursor};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::FetcherError;

pub(crate) enum StepOutcome {
    /// The cursor was fetched (possibly an empty/end-of-data page).
    Advanced {
        trades: Vec<Trade>,
        /// Set only when the page was full and a next cursor was
        /// discovered — the dynamic-discovery path (`spec.md` §9 Open
        /// Question b).
        discovered_next: Option<TradeId>,
    },
    /// Not a fetch failure: a transient error left attempts remaining.
    /// Goes back on the queue.
    Requeue(CursorTarget),
    /// The run cannot continue; the whole in-flight batch is abandoned.
    Fatal(FetcherError),
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn process_one<A, S>(
    adapter: &A,
    rate_limiter: &RateLimiter,
    circuit: &CircuitBreaker<S>,
    source: &str,
    product_id: &str,
    cancel: &CancellationToken,
    max_attempts: u32,
    page_limit: u32,
    target: CursorTarget,
) -> StepOutcome
where
    A: ExchangeAdapter,
    S: ConditionalStore,
{
    let wait = match circuit.wait_time(source).await {
        Ok(w) => w,
        Err(e) => return StepOutcome::Fatal(e.into()),
    };
    if wait > Duration::ZERO {
        // Deferral, not an attempt: the cursor itself never touched the
        // network, so its attempt counter is untouched. Sleep out the
        // cooldown here rather than bouncing the cursor straight back onto
        // the queue — the queue has no notion of "not yet", so without this
        // sleep every worker would re-pop and re-check in a hot loop for
        // the whole OPEN window (`spec.md` §4.5, §7 "CircuitOpen").
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => return StepOutcome::Fatal(FetcherError::Cancelled),
        }
    }

    if let Err(e) = rate_limiter.acquire(1, cancel).await {
        return match e {
            RateLimiterError::Cancelled => StepOutcome::Fatal(FetcherError::Cancelled),
            other => StepOutcome::Fatal(other.into()),
        };
    }

    let started = Instant::now();
    let result = adapter.fetch_page(product_id, target.after, page_limit).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match &result {
        Ok(_) => {
            if let Err(e) = circuit.record_outcome(source, Outcome::Success { response_time_ms: elapsed_ms }).await {
                return StepOutcome::Fatal(e.into());
            }
        }
        Err(e) if e.kind().counts_as_circuit_failure() => {
            let message = e.to_string();
            if let Err(ce) = circuit
                .record_outcome(source, Outcome::Failure { response_time_ms: elapsed_ms, message })
                .await
            {
                return StepOutcome::Fatal(ce.into());
            }
        }
        _ => {}
    }

    match result {
        Ok((trades, next)) => {
            let full_page = trades.len() as u32 >= page_limit;
            let discovered_next = match (full_page, next) {
                (true, PageCursor::Next(id)) => Some(id),
                _ => None,
            };
            StepOutcome::Advanced { trades, discovered_next }
        }
        Err(e) => {
            let kind = e.kind();
            if kind.is_fatal() {
                StepOutcome::Fatal(e.into())
            } else if kind.is_retriable_for_cursor() {
                if target.attempts + 1 >= max_attempts {
                    StepOutcome::Fatal(FetcherError::AttemptsExhausted {
                        after: target.after,
                        last_error: e.to_string(),
                    })
                } else {
                    StepOutcome::Requeue(target.retry())
                }
            } else {
                StepOutcome::Fatal(e.into())
            }
        }
    }
}

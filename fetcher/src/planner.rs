//! Cursor planning (`spec.md` §4.6 "Planning"): where a product's fetch
//! should start, and how far back a cold start (no checkpoint yet) is
//! allowed to reach before the time cutoff stops it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use schemahub_core::ids::TradeId;

use crate::error::FetcherError;
use schemahub_adapter::ExchangeAdapter;

/// Caps how many backward-doubling probes `cold_start_boundary` will issue
/// before giving up and returning its best estimate, so a pathological
/// upstream (or a bug) can't spin forever.
const MAX_PROBES: u32 = 64;

/// Finds the cursor a cold-start (no existing checkpoint) run should begin
/// after, by walking backward from `head` in exponentially growing steps
/// until a page is found whose oldest trade is older than `cutoff_at`, then
/// narrowing to the exact boundary trade within that page.
///
/// Returns `0` (fetch everything) if the product has no history, if the
/// probes run out before finding a boundary, or if every trade is already
/// within the cutoff window.
pub async fn cold_start_boundary<A: ExchangeAdapter>(
    adapter: &A,
    product_id: &str,
    head: TradeId,
    now: DateTime<Utc>,
    cutoff: Duration,
    page_limit: u32,
) -> Result<TradeId, FetcherError> {
    if head == 0 {
        return Ok(0);
    }

    let cutoff_at = now - chrono::Duration::from_std(cutoff).unwrap_or_else(|_| chrono::Duration::zero());
    let mut step = page_limit.max(1) as u64;
    let mut probe = head;

    for _ in 0..MAX_PROBES {
        let after = probe.saturating_sub(step);
        let (trades, _) = adapter.fetch_page(product_id, after, step as u32).await?;

        if after == 0 {
            return Ok(0);
        }

        let Some(oldest) = trades.first() else {
            // Sparse id space: nothing between `after` and `probe`. Keep
            // walking back from `after` itself.
            probe = after;
            step = step.saturating_mul(2);
            continue;
        };

        if oldest.time >= cutoff_at {
            // Whole page is still within the window; the boundary is
            // further back.
            probe = after;
            step = step.saturating_mul(2);
            continue;
        }

        // This page straddles the cutoff: the boundary trade is the first
        // one at or after `cutoff_at`.
        let boundary = trades
            .iter()
            .find(|t| t.time >= cutoff_at)
            .map(|t| t.trade_id.saturating_sub(1))
            .unwrap_or(after);
        return Ok(boundary);
    }

    // Gave up without finding a boundary: conservatively use the last
    // probed position rather than looping forever.
    Ok(probe)
}

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Current wall-clock time. Centralized so tests can (eventually) substitute
/// a fake clock at the same seam.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn now_ms() -> u64 {
    now().timestamp_millis().max(0) as u64
}

/// Formats an instant per the raw object key schema: `YYYYMMDDTHHMMSSZ`,
/// floored to the second.
pub fn key_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Logs (via `tracing::warn!`) when `fut` takes longer than `max` to resolve.
/// Does not affect control flow; purely observational.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}

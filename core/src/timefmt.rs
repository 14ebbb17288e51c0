use chrono::{DateTime, Utc};

/// Formats an instant per the raw object key schema (`spec.md` §3):
/// `YYYYMMDDTHHMMSSZ`, floored to the second.
pub fn key_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

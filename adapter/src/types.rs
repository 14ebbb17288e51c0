use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use schemahub_core::ids::TradeId;
use schemahub_core::model::Side;

/// Wire shape of a single trade as the upstream returns it, newest-first
/// within a page (`spec.md` §4.2 "Protocol details"). `price`/`size` arrive
/// as JSON strings (exact decimal text, never floats) and are parsed
/// directly into `Decimal` via `rust_decimal`'s `serde-with-str` feature.
#[derive(Clone, Debug, Deserialize)]
pub struct WireTrade {
    pub trade_id: TradeId,
    pub price: Decimal,
    pub size: Decimal,
    pub time: DateTime<Utc>,
    pub side: Side,
}

/// Envelope returned by the trades endpoint. `after` is the upstream's own
/// pagination cursor field when present; absent on some upstreams, in
/// which case the adapter derives the next cursor from `max(trade_id)`
/// (`spec.md` §4.2).
#[derive(Clone, Debug, Deserialize)]
pub struct WirePage {
    pub trades: Vec<WireTrade>,
    #[serde(default)]
    pub after: Option<TradeId>,
}

/// Where the next page should resume from, or a signal that no further
/// trades exist past the requested `after` cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageCursor {
    Next(TradeId),
    End,
}

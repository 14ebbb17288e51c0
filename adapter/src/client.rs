use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemahub_core::ids::TradeId;
use schemahub_core::model::{Side, Trade};
use tracing::{debug, instrument};

use crate::error::status_to_error;
use crate::types::{PageCursor, WirePage};
use crate::AdapterError;

/// Translates `CursorTarget`s into pages of `Trade`s, hiding HTTP concerns
/// from the rest of the core (`spec.md` §4.2). Implementations must not
/// retry internally — the fetcher owns retry so the circuit breaker
/// observes every attempt (§9 "Retry/backoff composition").
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Largest currently visible `trade_id` for `product_id`. `Ok(0)` means
    /// the product has no trade history at all yet.
    async fn head(&self, product_id: &str) -> Result<TradeId, AdapterError>;

    /// Fetches up to `limit` trades with id strictly greater than `after`,
    /// returned ascending. `PageCursor::End` means no further trades exist
    /// past `after` at the time of the call.
    async fn fetch_page(&self, product_id: &str, after: TradeId, limit: u32) -> Result<(Vec<Trade>, PageCursor), AdapterError>;
}

/// `spec.md` §6 "Upstream exchange API" concretized against a generic
/// coinbase-like cursored trades endpoint, the same `reqwest::Client`
/// shape the teacher's `StonfiClient` uses (`timeout`, `pool_idle_timeout`,
/// `tcp_keepalive`, `#[instrument]`, `error_for_status`-equivalent mapping).
#[derive(Clone)]
pub struct HttpExchangeAdapter {
    http: Client,
    base_url: String,
    source: String,
    /// Whether to stamp `_raw_payload` with the re-serialized wire trade.
    /// Costs allocation per trade; off by default for high-volume products.
    capture_raw_payload: bool,
}

impl HttpExchangeAdapter {
    pub fn new(base_url: impl Into<String>, source: impl Into<String>, request_timeout: Duration) -> Result<Self, AdapterError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| AdapterError::TransportError(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            source: source.into(),
            capture_raw_payload: false,
        })
    }

    pub fn with_raw_payload_capture(mut self, capture: bool) -> Self {
        self.capture_raw_payload = capture;
        self
    }

    async fn fetch_raw(&self, product_id: &str, after: Option<TradeId>, limit: u32) -> Result<WirePage, AdapterError> {
        let url = format!("{}/products/{}/trades", self.base_url.trim_end_matches('/'), product_id);
        let mut req = self.http.get(&url).query(&[("limit", limit.to_string())]);
        if let Some(after) = after {
            req = req.query(&[("after", after.to_string())]);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(status_to_error(status.as_u16()));
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| AdapterError::ProtocolError(e.to_string()))
    }

    fn to_trade(&self, product_id: &str, wire: crate::types::WireTrade) -> Trade {
        let raw_payload = self.capture_raw_payload.then(|| serde_json::to_string(&RawTradeView {
            trade_id: wire.trade_id,
            price: wire.price,
            size: wire.size,
            time: wire.time,
            side: wire.side,
        }).unwrap_or_default());

        Trade {
            trade_id: wire.trade_id,
            product_id: product_id.to_string(),
            price: wire.price,
            size: wire.size,
            time: wire.time,
            side: wire.side,
            source: self.source.clone(),
            source_ingest_ts: schemahub_common::time::now(),
            raw_payload,
        }
    }
}

/// Re-serialization target for `_raw_payload`; deliberately mirrors
/// `WireTrade` field-for-field rather than reusing it, so a future wire
/// schema change doesn't silently change what gets archived as "raw".
#[derive(serde::Serialize)]
struct RawTradeView {
    trade_id: TradeId,
    price: rust_decimal::Decimal,
    size: rust_decimal::Decimal,
    time: chrono::DateTime<chrono::Utc>,
    side: Side,
}

#[async_trait]
impl ExchangeAdapter for HttpExchangeAdapter {
    #[instrument(skip(self), fields(product_id))]
    async fn head(&self, product_id: &str) -> Result<TradeId, AdapterError> {
        let page = self.fetch_raw(product_id, None, 1).await?;
        let head = page.trades.first().map(|t| t.trade_id).unwrap_or(0);
        debug!(product_id, head, "head probe");
        Ok(head)
    }

    #[instrument(skip(self), fields(product_id, after, limit))]
    async fn fetch_page(&self, product_id: &str, after: TradeId, limit: u32) -> Result<(Vec<Trade>, PageCursor), AdapterError> {
        let page = self.fetch_raw(product_id, Some(after), limit).await?;

        if page.trades.is_empty() {
            return Ok((Vec::new(), PageCursor::End));
        }

        // Upstream returns newest-first; the rest of the core only ever
        // deals in ascending order (spec.md §4.2 "Protocol details").
        let mut wire = page.trades;
        wire.reverse();

        let next = match page.after {
            Some(c) => PageCursor::Next(c),
            None => PageCursor::Next(wire.iter().map(|t| t.trade_id).max().unwrap_or(after)),
        };

        let trades = wire.into_iter().map(|w| self.to_trade(product_id, w)).collect();
        Ok((trades, next))
    }
}

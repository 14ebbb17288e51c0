//! In-memory result assembly (`spec.md` §4.6 "Result assembly"). Pages
//! arrive out of cursor-order (different chunk workers finish at different
//! times) but never out of trade-id order *within* a page; keying on
//! `trade_id` both sorts the eventual flush and makes re-fetched pages
//! (after a retry) idempotent.

use std::collections::BTreeMap;

use schemahub_core::ids::TradeId;
use schemahub_core::model::Trade;

pub struct Aggregator {
    buffer: BTreeMap<TradeId, Trade>,
    bytes: usize,
    flush_trades: usize,
    flush_bytes: usize,
}

impl Aggregator {
    pub fn new(flush_trades: usize, flush_bytes: usize) -> Self {
        Self {
            buffer: BTreeMap::new(),
            bytes: 0,
            flush_trades,
            flush_bytes,
        }
    }

    pub fn ingest(&mut self, trades: Vec<Trade>) {
        for trade in trades {
            self.bytes += estimate_size(&trade);
            self.buffer.insert(trade.trade_id, trade);
        }
    }

    pub fn should_flush(&self) -> bool {
        !self.buffer.is_empty() && (self.buffer.len() >= self.flush_trades || self.bytes >= self.flush_bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Drains the buffer in ascending `trade_id` order, resetting the byte
    /// counter for the next accumulation cycle.
    pub fn take(&mut self) -> Vec<Trade> {
        self.bytes = 0;
        std::mem::take(&mut self.buffer).into_values().collect()
    }
}

fn estimate_size(trade: &Trade) -> usize {
    serde_json::to_vec(trade).map(|b| b.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use schemahub_core::model::Side;

    fn trade(id: u64) -> Trade {
        Trade {
            trade_id: id,
            product_id: "BTC-USD".to_string(),
            price: Decimal::new(100, 0),
            size: Decimal::new(1, 0),
            time: Utc::now(),
            side: Side::Buy,
            source: "coinbase".to_string(),
            source_ingest_ts: Utc::now(),
            raw_payload: None,
        }
    }

    #[test]
    fn flushes_once_trade_count_threshold_reached() {
        let mut agg = Aggregator::new(3, usize::MAX);
        agg.ingest(vec![trade(1), trade(2)]);
        assert!(!agg.should_flush());
        agg.ingest(vec![trade(3)]);
        assert!(agg.should_flush());
    }

    #[test]
    fn take_drains_in_ascending_order_regardless_of_arrival_order() {
        let mut agg = Aggregator::new(100, usize::MAX);
        agg.ingest(vec![trade(5), trade(6)]);
        agg.ingest(vec![trade(1), trade(2)]);
        let drained = agg.take();
        let ids: Vec<u64> = drained.iter().map(|t| t.trade_id).collect();
        assert_eq!(ids, vec![1, 2, 5, 6]);
        assert!(agg.is_empty());
    }

    #[test]
    fn re_ingesting_same_trade_id_does_not_duplicate() {
        let mut agg = Aggregator::new(100, usize::MAX);
        agg.ingest(vec![trade(1)]);
        agg.ingest(vec![trade(1)]);
        assert_eq!(agg.len(), 1);
    }
}

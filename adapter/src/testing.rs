//! In-memory `ExchangeAdapter` fake driving the fetcher/orchestrator
//! integration tests (scenarios S1-S6) without any network or a live
//! upstream, the same "fakes over mocks" shape as the teacher's
//! `MockSessionRepository`.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use schemahub_core::ids::TradeId;
use schemahub_core::model::Trade;

use crate::{AdapterError, ExchangeAdapter, PageCursor};

/// One scripted response a `FakeExchangeAdapter::fetch_page` call should
/// return, in call order per `product_id`.
pub enum ScriptedResponse {
    Page(Vec<Trade>, PageCursor),
    Err(AdapterError),
}

#[derive(Default)]
pub struct FakeExchangeAdapter {
    /// All trades this fake "has", ascending by trade_id, per product.
    trades: Mutex<std::collections::HashMap<String, Vec<Trade>>>,
    /// Pre-scripted `fetch_page` responses consumed in order before falling
    /// back to serving straight from `trades`, keyed by product_id. Used to
    /// inject transient failures (S3, S4) at specific cursors.
    scripts: Mutex<std::collections::HashMap<String, VecDeque<(TradeId, ScriptedResponse)>>>,
}

impl FakeExchangeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, product_id: &str, trades: Vec<Trade>) {
        self.trades.lock().unwrap().insert(product_id.to_string(), trades);
    }

    /// Scripts a one-shot response for the next `fetch_page(product_id,
    /// after, _)` call matching `after`. Consumed exactly once.
    pub fn script(&self, product_id: &str, after: TradeId, response: ScriptedResponse) {
        self.scripts
            .lock()
            .unwrap()
            .entry(product_id.to_string())
            .or_default()
            .push_back((after, response));
    }
}

#[async_trait]
impl ExchangeAdapter for FakeExchangeAdapter {
    async fn head(&self, product_id: &str) -> Result<TradeId, AdapterError> {
        Ok(self
            .trades
            .lock()
            .unwrap()
            .get(product_id)
            .and_then(|t| t.last())
            .map(|t| t.trade_id)
            .unwrap_or(0))
    }

    async fn fetch_page(&self, product_id: &str, after: TradeId, limit: u32) -> Result<(Vec<Trade>, PageCursor), AdapterError> {
        {
            let mut scripts = self.scripts.lock().unwrap();
            if let Some(queue) = scripts.get_mut(product_id) {
                if let Some(pos) = queue.iter().position(|(a, _)| *a == after) {
                    let (_, response) = queue.remove(pos).unwrap();
                    return match response {
                        ScriptedResponse::Page(trades, cursor) => Ok((trades, cursor)),
                        ScriptedResponse::Err(e) => Err(e),
                    };
                }
            }
        }

        let trades = self.trades.lock().unwrap();
        let Some(all) = trades.get(product_id) else {
            return Ok((Vec::new(), PageCursor::End));
        };

        let page: Vec<Trade> = all
            .iter()
            .filter(|t| t.trade_id > after)
            .take(limit as usize)
            .cloned()
            .collect();

        if page.is_empty() {
            return Ok((Vec::new(), PageCursor::End));
        }

        let next = page.last().map(|t| t.trade_id).unwrap_or(after);
        Ok((page, PageCursor::Next(next)))
    }
}

//! Exchange adapter, `spec.md` §4.2: cursored-pagination HTTP client that
//! hides upstream protocol details (ordering, cursor derivation, status
//! code mapping) from the fetcher.

mod client;
mod error;
mod types;

#[cfg(feature = "test-util")]
pub mod testing;

pub use client::{ExchangeAdapter, HttpExchangeAdapter};
pub use error::AdapterError;
pub use types::{PageCursor, WirePage, WireTrade};

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn wire_page_parses_prices_as_decimal_strings() {
        let body = serde_json::json!({
            "trades": [
                {"trade_id": 1003, "price": "64321.55", "size": "0.5", "time": "2026-07-27T12:00:00Z", "side": "BUY"},
                {"trade_id": 1002, "price": "64320.10", "size": "1.0", "time": "2026-07-27T11:59:59Z", "side": "SELL"},
            ],
            "after": 1000,
        });

        let page: WirePage = serde_json::from_value(body).unwrap();
        assert_eq!(page.trades.len(), 2);
        assert_eq!(page.trades[0].price, Decimal::new(6432155, 2));
        assert_eq!(page.after, Some(1000));
    }

    #[test]
    fn wire_page_after_defaults_to_none_when_absent() {
        let body = serde_json::json!({
            "trades": [
                {"trade_id": 1, "price": "1.00", "size": "1", "time": "2026-07-27T12:00:00Z", "side": "BUY"},
            ],
        });
        let page: WirePage = serde_json::from_value(body).unwrap();
        assert_eq!(page.after, None);
    }

    #[test]
    fn status_mapping_matches_disposition_table() {
        use error::status_to_error;
        assert!(matches!(status_to_error(429), AdapterError::RateLimited));
        assert!(matches!(status_to_error(500), AdapterError::ServerError { status: 500 }));
        assert!(matches!(status_to_error(503), AdapterError::ServerError { status: 503 }));
        assert!(matches!(status_to_error(404), AdapterError::ClientError { status: 404 }));
        assert!(matches!(status_to_error(400), AdapterError::ClientError { status: 400 }));
    }

    use schemahub_core::Classify;

    #[test]
    fn error_kinds_match_spec_disposition() {
        assert_eq!(AdapterError::RateLimited.kind(), schemahub_core::ErrorKind::RateLimited);
        assert_eq!(AdapterError::ServerError { status: 500 }.kind(), schemahub_core::ErrorKind::ServerError);
        assert_eq!(AdapterError::ClientError { status: 404 }.kind(), schemahub_core::ErrorKind::ClientError);
        assert_eq!(
            AdapterError::TransportError("timeout".into()).kind(),
            schemahub_core::ErrorKind::TransportError
        );
        assert_eq!(
            AdapterError::ProtocolError("bad json".into()).kind(),
            schemahub_core::ErrorKind::ProtocolError
        );
    }
}

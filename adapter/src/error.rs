use thiserror::Error;

use schemahub_core::{Classify, ErrorKind};

/// Error mapping, `spec.md` §4.2 "Error mapping". The adapter never retries
/// internally (§4.2, §9 "Retry/backoff composition") — it only classifies.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("upstream server error (HTTP {status})")]
    ServerError { status: u16 },

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("malformed response body: {0}")]
    ProtocolError(String),

    #[error("client error (HTTP {status}), fatal")]
    ClientError { status: u16 },
}

impl Classify for AdapterError {
    fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::RateLimited => ErrorKind::RateLimited,
            AdapterError::ServerError { .. } => ErrorKind::ServerError,
            AdapterError::TransportError(_) => ErrorKind::TransportError,
            AdapterError::ProtocolError(_) => ErrorKind::ProtocolError,
            AdapterError::ClientError { .. } => ErrorKind::ClientError,
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            return AdapterError::TransportError(e.to_string());
        }
        if let Some(status) = e.status() {
            return status_to_error(status.as_u16());
        }
        AdapterError::TransportError(e.to_string())
    }
}

pub(crate) fn status_to_error(status: u16) -> AdapterError {
    match status {
        429 => AdapterError::RateLimited,
        500..=599 => AdapterError::ServerError { status },
        400..=499 => AdapterError::ClientError { status },
        _ => AdapterError::ProtocolError(format!("unexpected HTTP status {status}")),
    }
}

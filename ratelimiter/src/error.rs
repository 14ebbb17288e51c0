use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateLimiterError {
    #[error("requested {requested} tokens exceeds bucket burst capacity {burst}")]
    RequestExceedsBurst { requested: u32, burst: f64 },

    #[error("acquire cancelled before tokens became available")]
    Cancelled,
}

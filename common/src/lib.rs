//! Cross-cutting concerns shared by every SchemaHub ingestion crate:
//! tracing initialization, correlation ids, and small time helpers.

pub mod logger;
pub mod time;

pub use logger::trace_id::TraceId;

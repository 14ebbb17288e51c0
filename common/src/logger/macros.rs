use tracing::{Level, Span};

use super::TraceId;

/// Root span for a single orchestrator run; all component spans nest under it.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::span!(
        Level::INFO,
        "run",
        name = name,
        trace_id = %trace_id.as_str(),
        product_id = tracing::field::Empty,
    )
}

/// Child span for a component-level operation (inherits the run's fields).
pub fn child_span(name: &'static str) -> Span {
    tracing::span!(Level::INFO, "component", name = name)
}

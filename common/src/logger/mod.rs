pub mod init;
pub mod macros;
pub mod trace_id;

pub use init::init_tracing;
pub use trace_id::TraceId;

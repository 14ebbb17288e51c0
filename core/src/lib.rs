//! Shared domain model for the SchemaHub ingestion core: the statically
//! enumerated schema that every component (rate limiter excepted — it knows
//! nothing about trades) produces, consumes, or persists.
//!
//! Kept deliberately free of any component's behavior: this crate is data
//! and error-kind definitions only, so every downstream crate can depend on
//! it without pulling in HTTP, SQL, or filesystem concerns.

pub mod error;
pub mod ids;
pub mod model;
pub mod timefmt;

pub use error::{Classify, ErrorKind};
pub use model::*;

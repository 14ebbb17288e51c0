//! Namespaced key-value blob store abstraction, `spec.md` §6.
//!
//! Required operations only: `put`, `get`, `list`. No transactional
//! cross-key semantics are assumed or provided — exactly the contract
//! `spec.md` requires and nothing more.

mod error;
mod fs;

#[cfg(feature = "test-util")]
pub mod testing;

pub use error::ObjectStoreError;
pub use fs::FsObjectStore;

use async_trait::async_trait;

/// Abstraction over the durable blob store backing raw objects and
/// checkpoint documents. Implementations must make `put` atomic at the
/// single-object level (`spec.md` §6) — readers never observe a partially
/// written object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError>;

    /// Returns `Ok(None)` when the key does not exist (the `NOT_FOUND` case
    /// in `spec.md` §6), as opposed to `Err` for genuine I/O failures.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError>;

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError>;
}

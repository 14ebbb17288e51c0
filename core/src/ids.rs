use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique id minted once per orchestrator invocation. Embedded in
/// every raw object key written during the run so that concurrent or
/// replayed runs can never collide on a key (invariant O2 / property P3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

/// A trade identifier from the upstream exchange. Monotonic per product;
/// not necessarily densely packed (see `spec.md` §9 Open Question b).
pub type TradeId = u64;

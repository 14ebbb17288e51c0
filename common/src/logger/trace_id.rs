use uuid::Uuid;

/// Correlation id threaded through a single run's logs and structured errors.
///
/// This is distinct from `core::model::RunId`: a `TraceId` is purely a
/// logging concern (it may outlive or span multiple runs, e.g. in a future
/// multi-product driver), while `RunId` is a persisted domain value baked
/// into raw object keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceId(Uuid);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> String {
        self.0.as_hyphenated().to_string()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

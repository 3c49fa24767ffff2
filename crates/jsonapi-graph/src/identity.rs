use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(type, id)` pair naming one logical resource instance.
///
/// Identities are the deduplication unit of the whole pipeline: id trees,
/// resource sets, and the `included` array are all keyed by them. Ordering is
/// by type first, then id, which keeps every map built from identities
/// deterministic across runs.
///
/// Serializes as a JSON:API resource identifier object:
///
/// ```json
/// { "type": "people", "id": "9" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentity {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

impl ResourceIdentity {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Parse the `type:id` shorthand used by fixtures and the CLI.
    pub fn parse(s: &str) -> Option<Self> {
        let (resource_type, id) = s.split_once(':')?;
        if resource_type.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self::new(resource_type, id))
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

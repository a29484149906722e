//! Graph identity of a device twin.
//!
//! A twin is known to the hub by its device id, but the graph holds twins
//! from several hubs side by side. The hub name is used as an id prefix so
//! that the vertex key stays globally unique.

use serde::{Deserialize, Serialize};

/// Composite vertex key `{hub_name}-{twin_id}` of a device vertex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphTwinId(String);

impl GraphTwinId {
    /// Build the graph identity for a twin reported by `hub_name`.
    pub fn new(hub_name: &str, twin_id: &str) -> Self {
        Self(format!("{hub_name}-{twin_id}"))
    }

    /// Borrow the key as a string slice.
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Return the inner key.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for GraphTwinId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GraphTwinId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<GraphTwinId> for String {
    fn from(id: GraphTwinId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_name_prefixes_twin_id() {
        let id = GraphTwinId::new("contoso-hub", "thermostat-7");
        assert_eq!(id.as_str(), "contoso-hub-thermostat-7");
        assert_eq!(id.to_string(), "contoso-hub-thermostat-7");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = GraphTwinId::new("hub", "dev");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"hub-dev\"");
    }
}

//! Result records returned by the graph store.
//!
//! A query yields vertices or edges. Vertex properties are multi-valued:
//! each property name maps to one or more typed JSON values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A vertex as returned by the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Vertex id.
    pub id: String,
    /// Vertex label (e.g. `thermostat`, `room`).
    pub label: String,
    /// Property name to its values.
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<serde_json::Value>>,
}

impl Vertex {
    /// First value of the named property.
    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.get(name).and_then(|values| values.first())
    }

    /// First value of the named property rendered as a string.
    ///
    /// Strings are returned as-is, numbers and booleans in their JSON
    /// form. `null`, arrays and objects yield `None`.
    pub fn property_string(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// A directed edge as returned by the graph store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge id.
    pub id: String,
    /// Edge label (e.g. `located`).
    pub label: String,
    /// Id of the vertex the edge leaves.
    pub out_v: String,
    /// Id of the vertex the edge enters.
    pub in_v: String,
}

/// One result record of a graph query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    /// A vertex result.
    Vertex(Vertex),
    /// An edge result.
    Edge(Edge),
}

impl Record {
    /// Id of the underlying vertex or edge.
    pub fn id(&self) -> &str {
        match self {
            Self::Vertex(v) => &v.id,
            Self::Edge(e) => &e.id,
        }
    }

    /// Return the vertex, or `None` if this is an edge.
    pub fn into_vertex(self) -> Option<Vertex> {
        match self {
            Self::Vertex(v) => Some(v),
            Self::Edge(_) => None,
        }
    }

    /// Return the edge, or `None` if this is a vertex.
    pub fn into_edge(self) -> Option<Edge> {
        match self {
            Self::Edge(e) => Some(e),
            Self::Vertex(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thermostat(version: serde_json::Value) -> Vertex {
        let mut properties = BTreeMap::new();
        properties.insert("version".to_owned(), vec![version]);
        Vertex {
            id: "hub-t1".to_owned(),
            label: "thermostat".to_owned(),
            properties,
        }
    }

    #[test]
    fn property_string_renders_scalars() {
        assert_eq!(
            thermostat(serde_json::json!("3")).property_string("version").as_deref(),
            Some("3")
        );
        assert_eq!(
            thermostat(serde_json::json!(3)).property_string("version").as_deref(),
            Some("3")
        );
        assert_eq!(
            thermostat(serde_json::Value::Null).property_string("version"),
            None
        );
        assert_eq!(thermostat(serde_json::json!(3)).property_string("missing"), None);
    }

    #[test]
    fn record_projection() {
        let record = Record::Vertex(thermostat(serde_json::json!("1")));
        assert_eq!(record.id(), "hub-t1");
        assert!(record.clone().into_edge().is_none());
        assert!(record.into_vertex().is_some());
    }
}

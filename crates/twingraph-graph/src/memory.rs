//! In-memory property graph.
//!
//! [`InMemoryGraph`] executes the [`GraphQuery`] vocabulary directly on
//! maps of vertices and edges. It enforces vertex-id uniqueness the way a
//! real store does, reporting [`StoreError::Conflict`], and it is what the
//! engine runs against when `GRAPH_BACKEND=memory`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use futures::StreamExt as _;
use twingraph_types::{Edge, Record, Vertex};

use crate::error::StoreError;
use crate::query::{
    ADDRESS_PROPERTY, BUILDING_LABEL, FLOOR_LABEL, GraphQuery, LOCATED_LABEL, NAME_PROPERTY,
    Properties, ROOM_LABEL,
};
use crate::store::{GraphStore, ResultPages};

/// Vertex and edge tables.
#[derive(Debug, Default)]
struct GraphState {
    vertices: BTreeMap<String, Vertex>,
    edges: BTreeMap<String, Edge>,
    next_edge: u64,
}

/// A property graph held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    state: Mutex<GraphState>,
}

impl InMemoryGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a vertex by id.
    pub fn vertex(&self, id: &str) -> Option<Vertex> {
        self.state.lock().ok()?.vertices.get(id).cloned()
    }

    /// Outgoing edges of a vertex with the given label.
    pub fn out_edges(&self, vertex_id: &str, label: &str) -> Vec<Edge> {
        self.state
            .lock()
            .map(|state| {
                state
                    .edges
                    .values()
                    .filter(|e| e.out_v == vertex_id && e.label == label)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of vertices with the given label.
    pub fn count_label(&self, label: &str) -> usize {
        self.state
            .lock()
            .map(|state| state.vertices.values().filter(|v| v.label == label).count())
            .unwrap_or_default()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.state.lock().map(|state| state.edges.len()).unwrap_or_default()
    }

    /// Execute one query against the graph.
    fn run(&self, query: &GraphQuery) -> Result<Vec<Record>, StoreError> {
        let mut state = self.state.lock().map_err(|e| StoreError::Backend {
            message: format!("in-memory graph lock poisoned: {e}"),
        })?;
        state.apply(query)
    }
}

impl GraphStore for InMemoryGraph {
    fn submit<'a>(&'a self, query: &'a GraphQuery) -> ResultPages<'a> {
        futures::stream::iter([self.run(query)]).boxed()
    }
}

impl GraphState {
    fn apply(&mut self, query: &GraphQuery) -> Result<Vec<Record>, StoreError> {
        let records = match query {
            GraphQuery::AddVertex {
                label,
                id,
                properties,
            } => {
                if self.vertices.contains_key(id) {
                    return Err(StoreError::Conflict {
                        message: format!("resource with id {id} already exists"),
                    });
                }
                let mut vertex = Vertex {
                    id: id.clone(),
                    label: label.clone(),
                    properties: BTreeMap::new(),
                };
                set_properties(&mut vertex, properties);
                self.vertices.insert(id.clone(), vertex.clone());
                vec![Record::Vertex(vertex)]
            }
            GraphQuery::GetVertex { id } => self.vertex_records([id.as_str()]),
            GraphQuery::UpdateProperties { id, properties } => {
                if let Some(vertex) = self.vertices.get_mut(id) {
                    set_properties(vertex, properties);
                }
                self.vertex_records([id.as_str()])
            }
            GraphQuery::DropVertex { id } => {
                self.vertices.remove(id);
                self.edges.retain(|_, e| e.out_v != *id && e.in_v != *id);
                Vec::new()
            }
            GraphQuery::OutEdge { vertex_id, label } => self
                .edges
                .values()
                .filter(|e| e.out_v == *vertex_id && e.label == *label)
                .cloned()
                .map(Record::Edge)
                .collect(),
            GraphQuery::DropOutEdges { vertex_id, label } => {
                self.edges
                    .retain(|_, e| e.out_v != *vertex_id || e.label != *label);
                Vec::new()
            }
            GraphQuery::AddEdge {
                from_id,
                to_id,
                label,
            } => self
                .add_edge(from_id, to_id, label)
                .map(Record::Edge)
                .into_iter()
                .collect(),
            GraphQuery::FindRoom {
                building,
                floor,
                room,
            } => {
                let buildings = self.matching(BUILDING_LABEL, ADDRESS_PROPERTY, building, None);
                let floors = self.matching(FLOOR_LABEL, NAME_PROPERTY, floor, Some(&buildings));
                let rooms = self.matching(ROOM_LABEL, NAME_PROPERTY, room, Some(&floors));
                self.vertex_records(rooms.iter().map(String::as_str))
            }
            GraphQuery::LocatedParent {
                vertex_id,
                label,
                property,
            } => {
                let parents: Vec<&str> = self
                    .edges
                    .values()
                    .filter(|e| e.out_v == *vertex_id && e.label == LOCATED_LABEL)
                    .filter_map(|e| self.vertices.get(&e.in_v))
                    .filter(|v| v.label == *label && v.properties.contains_key(property))
                    .map(|v| v.id.as_str())
                    .collect();
                self.vertex_records(parents)
            }
        };
        Ok(records)
    }

    fn vertex_records<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<Record> {
        ids.into_iter()
            .filter_map(|id| self.vertices.get(id))
            .cloned()
            .map(Record::Vertex)
            .collect()
    }

    fn add_edge(&mut self, from_id: &str, to_id: &str, label: &str) -> Option<Edge> {
        if !self.vertices.contains_key(from_id) || !self.vertices.contains_key(to_id) {
            return None;
        }
        let edge = Edge {
            id: format!("e-{}", self.next_edge),
            label: label.to_owned(),
            out_v: from_id.to_owned(),
            in_v: to_id.to_owned(),
        };
        self.next_edge = self.next_edge.saturating_add(1);
        self.edges.insert(edge.id.clone(), edge.clone());
        Some(edge)
    }

    /// Ids of vertices with `label` whose `key` equals `value`. When
    /// `children_of` is set, only vertices with a `located` edge into one
    /// of those ids qualify.
    fn matching(
        &self,
        label: &str,
        key: &str,
        value: &str,
        children_of: Option<&[String]>,
    ) -> Vec<String> {
        let candidates: Vec<&Vertex> = match children_of {
            None => self.vertices.values().collect(),
            Some(parents) => self
                .edges
                .values()
                .filter(|e| e.label == LOCATED_LABEL && parents.contains(&e.in_v))
                .filter_map(|e| self.vertices.get(&e.out_v))
                .collect(),
        };
        candidates
            .into_iter()
            .filter(|v| v.label == label && v.property_string(key).as_deref() == Some(value))
            .map(|v| v.id.clone())
            .collect()
    }
}

fn set_properties(vertex: &mut Vertex, properties: &Properties) {
    for (key, value) in properties {
        vertex
            .properties
            .insert(key.clone(), vec![serde_json::Value::String(value.clone())]);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::GraphClient;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    async fn tiny_topology(client: &GraphClient<InMemoryGraph>) {
        client
            .add_vertex(BUILDING_LABEL, "B-1", &props(&[(ADDRESS_PROPERTY, "1")]))
            .await
            .unwrap();
        client
            .add_vertex(FLOOR_LABEL, "F-1", &props(&[(NAME_PROPERTY, "G")]))
            .await
            .unwrap();
        client
            .add_vertex(ROOM_LABEL, "R-1", &props(&[(NAME_PROPERTY, "lobby")]))
            .await
            .unwrap();
        client.add_edge("F-1", "B-1", LOCATED_LABEL).await.unwrap();
        client.add_edge("R-1", "F-1", LOCATED_LABEL).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_vertex_id_conflicts() {
        let client = GraphClient::with_default_timeout(InMemoryGraph::new());
        client.add_vertex("thermostat", "t", &Properties::new()).await.unwrap();
        let err = client
            .add_vertex("thermostat", "t", &Properties::new())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(client.store().count_label("thermostat"), 1);
    }

    #[tokio::test]
    async fn update_replaces_property_values() {
        let client = GraphClient::with_default_timeout(InMemoryGraph::new());
        client
            .add_vertex("thermostat", "t", &props(&[("version", "1")]))
            .await
            .unwrap();
        let updated = client
            .update_vertex_properties("t", &props(&[("version", "2"), ("temperature", "20")]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.property_string("version").as_deref(), Some("2"));
        assert_eq!(updated.properties.get("version").map(Vec::len), Some(1));
        assert_eq!(updated.property_string("temperature").as_deref(), Some("20"));
    }

    #[tokio::test]
    async fn update_of_absent_vertex_yields_nothing() {
        let client = GraphClient::with_default_timeout(InMemoryGraph::new());
        let result = client
            .update_vertex_properties("ghost", &props(&[("version", "2")]))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn find_room_follows_hierarchy() {
        let client = GraphClient::with_default_timeout(InMemoryGraph::new());
        tiny_topology(&client).await;

        let room = client.find_room("1", "G", "lobby").await.unwrap();
        assert_eq!(room.map(|r| r.id), Some("R-1".to_owned()));

        assert!(client.find_room("2", "G", "lobby").await.unwrap().is_none());
        assert!(client.find_room("1", "X", "lobby").await.unwrap().is_none());
        assert!(client.find_room("1", "G", "attic").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn located_parents_walk_upwards() {
        let client = GraphClient::with_default_timeout(InMemoryGraph::new());
        tiny_topology(&client).await;
        client.add_vertex("thermostat", "t", &Properties::new()).await.unwrap();
        client.add_edge("t", "R-1", LOCATED_LABEL).await.unwrap();

        let room = client.room_of("t").await.unwrap().unwrap();
        let floor = client.floor_of(&room.id).await.unwrap().unwrap();
        let building = client.building_of(&floor.id).await.unwrap().unwrap();
        assert_eq!(building.property_string(ADDRESS_PROPERTY).as_deref(), Some("1"));
        assert!(client.building_of(&building.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn drop_vertex_removes_incident_edges() {
        let client = GraphClient::with_default_timeout(InMemoryGraph::new());
        tiny_topology(&client).await;
        client.add_vertex("thermostat", "t", &Properties::new()).await.unwrap();
        client.add_edge("t", "R-1", LOCATED_LABEL).await.unwrap();
        assert_eq!(client.store().edge_count(), 3);

        client.drop_vertex("t").await.unwrap();
        assert!(client.store().vertex("t").is_none());
        assert_eq!(client.store().edge_count(), 2);

        // Dropping twice is not an error.
        client.drop_vertex("t").await.unwrap();
    }

    #[tokio::test]
    async fn drop_out_edges_keeps_other_labels_and_directions() {
        let client = GraphClient::with_default_timeout(InMemoryGraph::new());
        tiny_topology(&client).await;
        client.add_vertex("thermostat", "t", &Properties::new()).await.unwrap();
        client.add_edge("t", "R-1", LOCATED_LABEL).await.unwrap();
        client.add_edge("t", "F-1", LOCATED_LABEL).await.unwrap();
        client.add_edge("t", "B-1", "monitors").await.unwrap();

        client.drop_out_edges("t", LOCATED_LABEL).await.unwrap();
        assert!(client.store().out_edges("t", LOCATED_LABEL).is_empty());
        assert_eq!(client.store().out_edges("t", "monitors").len(), 1);
        assert_eq!(client.store().out_edges("R-1", LOCATED_LABEL).len(), 1);
    }

    #[tokio::test]
    async fn add_edge_requires_both_endpoints() {
        let client = GraphClient::with_default_timeout(InMemoryGraph::new());
        client.add_vertex("thermostat", "t", &Properties::new()).await.unwrap();
        let edge = client.add_edge("t", "nowhere", LOCATED_LABEL).await.unwrap();
        assert!(edge.is_none());
        assert_eq!(client.store().edge_count(), 0);
    }
}

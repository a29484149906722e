//! The fixed query vocabulary the engine sends to the graph store.
//!
//! Each [`GraphQuery`] renders to a Gremlin [`Script`]. Only the traversal
//! shape is written into the script text; every id, label, property key
//! and property value is passed as a binding (`p0`, `p1`, ...), so no
//! value reported by a device can alter the traversal.

use std::collections::BTreeMap;

/// Label of device vertices.
pub const DEVICE_LABEL: &str = "thermostat";

/// Label of the edge from a device to its room, and from each topology
/// vertex to its parent.
pub const LOCATED_LABEL: &str = "located";

/// Label of building vertices.
pub const BUILDING_LABEL: &str = "building";

/// Label of floor vertices.
pub const FLOOR_LABEL: &str = "floor";

/// Label of room vertices.
pub const ROOM_LABEL: &str = "room";

/// Property holding a building's address.
pub const ADDRESS_PROPERTY: &str = "address";

/// Property holding a floor or room name.
pub const NAME_PROPERTY: &str = "name";

/// Ordered property-name to string-value mapping.
///
/// All properties are stored as strings; `version` and `temperature`
/// included.
pub type Properties = BTreeMap<String, String>;

/// A query the engine can submit to the graph store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphQuery {
    /// Add a vertex with an explicit id and properties.
    AddVertex {
        /// Vertex label.
        label: String,
        /// Vertex id.
        id: String,
        /// Initial properties.
        properties: Properties,
    },
    /// Fetch a vertex by id.
    GetVertex {
        /// Vertex id.
        id: String,
    },
    /// Set properties on an existing vertex.
    UpdateProperties {
        /// Vertex id.
        id: String,
        /// Properties to set.
        properties: Properties,
    },
    /// Drop a vertex and its incident edges.
    DropVertex {
        /// Vertex id.
        id: String,
    },
    /// Fetch the outgoing edges of a vertex with a given label.
    OutEdge {
        /// Source vertex id.
        vertex_id: String,
        /// Edge label.
        label: String,
    },
    /// Drop every outgoing edge of a vertex with a given label.
    ///
    /// Edges are reached from the vertex, not by id: edge ids may be
    /// numbers or strings depending on the provider.
    DropOutEdges {
        /// Source vertex id.
        vertex_id: String,
        /// Edge label.
        label: String,
    },
    /// Add a directed edge between two existing vertices.
    AddEdge {
        /// Source vertex id.
        from_id: String,
        /// Target vertex id.
        to_id: String,
        /// Edge label.
        label: String,
    },
    /// Walk building -> floor -> room and return the matching room.
    FindRoom {
        /// Building address.
        building: String,
        /// Floor name.
        floor: String,
        /// Room name.
        room: String,
    },
    /// Follow the outgoing `located` edge of a vertex to a parent vertex
    /// with the given label that carries the given property.
    LocatedParent {
        /// Child vertex id.
        vertex_id: String,
        /// Parent label.
        label: String,
        /// Property the parent must carry.
        property: String,
    },
}

/// A rendered Gremlin script and its parameter bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Traversal text referencing bindings by name.
    pub gremlin: String,
    /// Binding name to value.
    pub bindings: BTreeMap<String, serde_json::Value>,
}

impl GraphQuery {
    /// Id of the element this query creates or targets, for error reports.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::AddVertex { id, .. }
            | Self::GetVertex { id }
            | Self::UpdateProperties { id, .. }
            | Self::DropVertex { id } => Some(id),
            Self::OutEdge { vertex_id, .. }
            | Self::DropOutEdges { vertex_id, .. }
            | Self::LocatedParent { vertex_id, .. } => Some(vertex_id),
            Self::AddEdge { from_id, .. } => Some(from_id),
            Self::FindRoom { .. } => None,
        }
    }

    /// Render this query as a parameterized Gremlin script.
    pub fn to_script(&self) -> Script {
        let mut script = ScriptBuilder::default();
        match self {
            Self::AddVertex {
                label,
                id,
                properties,
            } => {
                let label = script.bind(label);
                let id = script.bind(id);
                script.push(&format!("g.addV({label}).property(T.id, {id})"));
                script.push_properties(properties);
            }
            Self::GetVertex { id } => {
                let id = script.bind(id);
                script.push(&format!("g.V({id})"));
            }
            Self::UpdateProperties { id, properties } => {
                let id = script.bind(id);
                script.push(&format!("g.V({id})"));
                script.push_properties(properties);
            }
            Self::DropVertex { id } => {
                let id = script.bind(id);
                script.push(&format!("g.V({id}).drop()"));
            }
            Self::OutEdge { vertex_id, label } => {
                let vertex_id = script.bind(vertex_id);
                let label = script.bind(label);
                script.push(&format!("g.V({vertex_id}).outE({label})"));
            }
            Self::DropOutEdges { vertex_id, label } => {
                let vertex_id = script.bind(vertex_id);
                let label = script.bind(label);
                script.push(&format!("g.V({vertex_id}).outE({label}).drop()"));
            }
            Self::AddEdge {
                from_id,
                to_id,
                label,
            } => {
                let from_id = script.bind(from_id);
                let label = script.bind(label);
                let to_id = script.bind(to_id);
                script.push(&format!("g.V({from_id}).addE({label}).to(__.V({to_id}))"));
            }
            Self::FindRoom {
                building,
                floor,
                room,
            } => {
                let building = script.bind(building);
                let floor = script.bind(floor);
                let room = script.bind(room);
                script.push(&format!(
                    "g.V().hasLabel('{BUILDING_LABEL}').has('{ADDRESS_PROPERTY}', {building})\
                     .inE('{LOCATED_LABEL}').outV().hasLabel('{FLOOR_LABEL}').has('{NAME_PROPERTY}', {floor})\
                     .inE('{LOCATED_LABEL}').outV().hasLabel('{ROOM_LABEL}').has('{NAME_PROPERTY}', {room})"
                ));
            }
            Self::LocatedParent {
                vertex_id,
                label,
                property,
            } => {
                let vertex_id = script.bind(vertex_id);
                let label = script.bind(label);
                let property = script.bind(property);
                script.push(&format!(
                    "g.V({vertex_id}).outE('{LOCATED_LABEL}').inV().hasLabel({label}).has({property})"
                ));
            }
        }
        script.finish()
    }
}

impl core::fmt::Display for GraphQuery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_script().gremlin)
    }
}

/// Accumulates script text and numbered bindings.
#[derive(Default)]
struct ScriptBuilder {
    gremlin: String,
    bindings: BTreeMap<String, serde_json::Value>,
}

impl ScriptBuilder {
    /// Register `value` as the next binding and return its name.
    fn bind(&mut self, value: &str) -> String {
        let name = format!("p{}", self.bindings.len());
        self.bindings
            .insert(name.clone(), serde_json::Value::String(value.to_owned()));
        name
    }

    fn push(&mut self, text: &str) {
        self.gremlin.push_str(text);
    }

    fn push_properties(&mut self, properties: &Properties) {
        for (key, value) in properties {
            let key = self.bind(key);
            let value = self.bind(value);
            self.push(&format!(".property({key}, {value})"));
        }
    }

    fn finish(self) -> Script {
        Script {
            gremlin: self.gremlin,
            bindings: self.bindings,
        }
    }
}

//! Building / floor / room topology seeding.
//!
//! The topology is fixed and created once at startup. Every floor and room
//! points at its parent with a `located` edge, the same edge label devices
//! use to point at their room:
//!
//! ```text
//! room --located--> floor --located--> building
//! ```
//!
//! If the first vertex already exists the graph is taken as seeded and
//! nothing else is written.

use tracing::info;

use crate::client::GraphClient;
use crate::error::GraphError;
use crate::query::{
    ADDRESS_PROPERTY, BUILDING_LABEL, FLOOR_LABEL, LOCATED_LABEL, NAME_PROPERTY, Properties,
    ROOM_LABEL,
};
use crate::store::GraphStore;

/// One vertex of the seeded topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyNode {
    /// Vertex id.
    pub id: &'static str,
    /// Vertex label.
    pub label: &'static str,
    /// Identifying property key (`address` or `name`).
    pub key: &'static str,
    /// Identifying property value.
    pub value: &'static str,
    /// Id of the parent vertex, if any.
    pub parent: Option<&'static str>,
}

const fn building(id: &'static str, address: &'static str) -> TopologyNode {
    TopologyNode {
        id,
        label: BUILDING_LABEL,
        key: ADDRESS_PROPERTY,
        value: address,
        parent: None,
    }
}

const fn floor(id: &'static str, name: &'static str, building: &'static str) -> TopologyNode {
    TopologyNode {
        id,
        label: FLOOR_LABEL,
        key: NAME_PROPERTY,
        value: name,
        parent: Some(building),
    }
}

const fn room(id: &'static str, name: &'static str, floor: &'static str) -> TopologyNode {
    TopologyNode {
        id,
        label: ROOM_LABEL,
        key: NAME_PROPERTY,
        value: name,
        parent: Some(floor),
    }
}

/// The seeded topology, parents before children.
pub const TOPOLOGY: &[TopologyNode] = &[
    // Building 43
    building("B-43", "43"),
    floor("Floor-1", "1", "B-43"),
    room("1R", "1R", "Floor-1"),
    room("1S", "1S", "Floor-1"),
    floor("Floor-2", "2", "B-43"),
    room("2R", "2R", "Floor-2"),
    room("2S", "2S", "Floor-2"),
    // Building 44
    building("B-44", "44"),
    floor("Floor-A", "A", "B-44"),
    room("A1", "A1", "Floor-A"),
    room("A2", "A2", "Floor-A"),
    floor("Floor-B", "B", "B-44"),
    room("B1", "B1", "Floor-B"),
    room("B2", "B2", "Floor-B"),
];

/// What [`seed_topology`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The topology was written.
    Created,
    /// The topology already existed; nothing was written.
    AlreadySeeded,
}

/// Create the building topology unless it already exists.
///
/// # Errors
///
/// Returns [`GraphError`] for any store failure other than the conflict
/// that marks an existing topology.
pub async fn seed_topology<S: GraphStore>(
    client: &GraphClient<S>,
) -> Result<SeedOutcome, GraphError> {
    info!("creating topology graph if it does not exist");

    for node in TOPOLOGY {
        let mut properties = Properties::new();
        properties.insert(node.key.to_owned(), node.value.to_owned());

        match client.add_vertex(node.label, node.id, &properties).await {
            Ok(_) => {}
            Err(e) if e.is_conflict() => {
                info!(id = node.id, "topology graph already exists");
                return Ok(SeedOutcome::AlreadySeeded);
            }
            Err(e) => return Err(e),
        }

        if let Some(parent) = node.parent {
            client.add_edge(node.id, parent, LOCATED_LABEL).await?;
        }
    }

    info!(vertices = TOPOLOGY.len(), "topology graph created");
    Ok(SeedOutcome::Created)
}

//! Resolution of the `located` relationship between a device and a room.
//!
//! The store has no notion of "at most one location per device", so
//! relocation is done procedurally: drop the current `located` edges, then
//! add the new one. The two steps are not atomic. A crash in between
//! leaves the device unlocated until the next sync of that device, which
//! redelivery guarantees.

use tracing::{debug, info, warn};
use twingraph_graph::query::{ADDRESS_PROPERTY, LOCATED_LABEL, NAME_PROPERTY};
use twingraph_graph::{GraphClient, GraphError, GraphStore};
use twingraph_types::{Location, Vertex};

/// Where a device ended up after a location change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationOutcome {
    /// The device is linked to this room.
    Located {
        /// Id of the room vertex.
        room_id: String,
    },
    /// The location did not resolve to a room; the device has no location.
    Unlocated,
}

/// Reads and rewrites a device's location edge.
#[derive(Debug)]
pub struct LocationResolver<'a, S> {
    graph: &'a GraphClient<S>,
}

impl<'a, S: GraphStore> LocationResolver<'a, S> {
    /// Create a resolver over the given graph client.
    pub const fn new(graph: &'a GraphClient<S>) -> Self {
        Self { graph }
    }

    /// Move `device` to `new_location`.
    ///
    /// Every current `located` edge is dropped first. If one survives the
    /// drop, no new edge is added. If `new_location` does not resolve to a
    /// room through building, floor and room, a warning is logged and the
    /// device is left without a location.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EdgeNotDropped`] if the old location edge is
    /// still present after the drop, and [`GraphError`] if any graph query
    /// fails.
    pub async fn replace_location(
        &self,
        device: &Vertex,
        new_location: &Location,
    ) -> Result<LocationOutcome, GraphError> {
        debug!(device = device.id, "getting current location if any");
        if let Some(edge) = self.graph.out_edge(&device.id, LOCATED_LABEL).await? {
            info!(device = device.id, edge = edge.id, room = edge.in_v, "removing current location");
            self.graph.drop_out_edges(&device.id, LOCATED_LABEL).await?;
            if let Some(stale) = self.graph.out_edge(&device.id, LOCATED_LABEL).await? {
                return Err(GraphError::EdgeNotDropped {
                    vertex_id: device.id.clone(),
                    label: LOCATED_LABEL.to_owned(),
                    edge_id: stale.id,
                });
            }
        }

        debug!(device = device.id, location = %new_location, "checking if new location is valid");
        let Some(room) = self.find_room(new_location).await? else {
            warn!(
                device = device.id,
                location = %new_location,
                "location not found in the graph, device will be located nowhere"
            );
            return Ok(LocationOutcome::Unlocated);
        };

        info!(device = device.id, room = room.id, "linking device to location");
        self.graph
            .add_edge(&device.id, &room.id, LOCATED_LABEL)
            .await?;
        Ok(LocationOutcome::Located { room_id: room.id })
    }

    /// Apply a partial location to `device`.
    ///
    /// Non-blank fields of `patch` override the device's current location;
    /// the merged result is then applied with
    /// [`replace_location`](Self::replace_location).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if any graph query fails.
    pub async fn update_location(
        &self,
        device: &Vertex,
        patch: &Location,
    ) -> Result<LocationOutcome, GraphError> {
        let current = self.current_location(device).await?;
        info!(device = device.id, current = %current, "current location");

        let merged = current.overlay(patch);
        debug!(device = device.id, merged = %merged, "replacing current location with updated location");
        self.replace_location(device, &merged).await
    }

    /// The device's current location, read device -> room -> floor ->
    /// building.
    ///
    /// Stops at the first missing hop and returns what was resolved so far.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if any graph query fails.
    pub async fn current_location(&self, device: &Vertex) -> Result<Location, GraphError> {
        let mut location = Location::default();

        let Some(room) = self.graph.room_of(&device.id).await? else {
            return Ok(location);
        };
        location.room = room.property_string(NAME_PROPERTY);

        let Some(floor) = self.graph.floor_of(&room.id).await? else {
            return Ok(location);
        };
        location.floor = floor.property_string(NAME_PROPERTY);

        if let Some(building) = self.graph.building_of(&floor.id).await? {
            location.building = building.property_string(ADDRESS_PROPERTY);
        }
        Ok(location)
    }

    async fn find_room(&self, location: &Location) -> Result<Option<Vertex>, GraphError> {
        match location.complete() {
            Some((building, floor, room)) => self.graph.find_room(building, floor, room).await,
            None => Ok(None),
        }
    }
}

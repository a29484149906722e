//! Sync commands.
//!
//! A [`SyncCommand`] is one twin change bound to the mutation it implies.
//! Every variant tolerates redelivery: creation treats an existing vertex
//! as already applied, full replacement is gated on the twin version, and
//! delete is unconditional. Only store failures escape as [`SyncError`].

use serde_json::Value;
use tracing::{debug, info, warn};
use twingraph_graph::query::{DEVICE_LABEL, Properties};
use twingraph_graph::{GraphClient, GraphStore};
use twingraph_types::{GraphTwinId, Vertex};

use crate::error::SyncError;
use crate::location::LocationResolver;
use crate::twin::{parse_reported_temperature, parse_tagged_location, parse_version};

/// Vertex property holding the twin version.
pub const VERSION_PROPERTY: &str = "version";

/// Vertex property holding the reported temperature.
pub const TEMPERATURE_PROPERTY: &str = "temperature";

/// Add/get rounds [`SyncCommand::AddOrGet`] makes before giving up.
pub const MAX_ADD_OR_GET_ATTEMPTS: u32 = 5;

/// A twin document addressed to one device.
#[derive(Debug, Clone, PartialEq)]
pub struct TwinChange {
    /// Name of the hub the device is registered in.
    pub hub_name: String,
    /// Device (twin) id within the hub.
    pub twin_id: String,
    /// The twin document.
    pub twin: Value,
}

impl TwinChange {
    /// Create a change for `twin_id` on `hub_name`.
    pub fn new(hub_name: impl Into<String>, twin_id: impl Into<String>, twin: Value) -> Self {
        Self {
            hub_name: hub_name.into(),
            twin_id: twin_id.into(),
            twin,
        }
    }

    /// The id of the device vertex this change targets.
    pub fn graph_twin_id(&self) -> GraphTwinId {
        GraphTwinId::new(&self.hub_name, &self.twin_id)
    }
}

/// What a command did to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The change was written.
    Applied,
    /// Create found the vertex already present and wrote nothing.
    AlreadyExists,
    /// The target vertex does not exist; nothing was written.
    NotFound,
    /// The incoming version is not newer than the stored one.
    StaleVersion {
        /// Version stored on the vertex.
        current: i64,
        /// Version carried by the twin document, if any.
        incoming: Option<i64>,
    },
    /// The vertex was dropped (or was already absent).
    Deleted,
}

/// A twin change bound to the graph mutation it implies.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncCommand {
    /// Add the vertex or fetch it if it exists, then apply temperature and
    /// location.
    AddOrGet(TwinChange),
    /// Add the vertex; an existing vertex is left untouched.
    Create(TwinChange),
    /// Patch temperature and location without a version check.
    Update(TwinChange),
    /// Replace version, temperature and location if the version is newer.
    Replace(TwinChange),
    /// Drop the vertex.
    Delete(TwinChange),
    /// [`Create`](Self::Create) if the vertex is absent, otherwise
    /// [`Replace`](Self::Replace).
    CreateOrUpdate(TwinChange),
}

impl SyncCommand {
    /// Short name used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddOrGet(_) => "add_or_get",
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::Replace(_) => "replace",
            Self::Delete(_) => "delete",
            Self::CreateOrUpdate(_) => "create_or_update",
        }
    }

    /// The change this command applies.
    pub const fn change(&self) -> &TwinChange {
        match self {
            Self::AddOrGet(change)
            | Self::Create(change)
            | Self::Update(change)
            | Self::Replace(change)
            | Self::Delete(change)
            | Self::CreateOrUpdate(change) => change,
        }
    }

    /// Execute the command against the graph.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if a graph query fails or, for
    /// [`AddOrGet`](Self::AddOrGet), if the vertex cannot be obtained.
    pub async fn run<S: GraphStore>(
        &self,
        graph: &GraphClient<S>,
    ) -> Result<CommandOutcome, SyncError> {
        let change = self.change();
        let id = change.graph_twin_id();
        debug!(command = self.name(), id = %id, "running sync command");

        match self {
            Self::AddOrGet(_) => add_or_get(graph, change, &id).await,
            Self::Create(_) => create(graph, change, &id).await,
            Self::Update(_) => update(graph, change, &id).await,
            Self::Replace(_) => match graph.get_vertex_by_id(id.as_str()).await? {
                Some(vertex) => replace(graph, change, &vertex).await,
                None => {
                    info!(id = %id, "vertex does not exist");
                    Ok(CommandOutcome::NotFound)
                }
            },
            Self::Delete(_) => delete(graph, &id).await,
            Self::CreateOrUpdate(_) => match graph.get_vertex_by_id(id.as_str()).await? {
                Some(vertex) => replace(graph, change, &vertex).await,
                None => create(graph, change, &id).await,
            },
        }
    }
}

async fn add_or_get<S: GraphStore>(
    graph: &GraphClient<S>,
    change: &TwinChange,
    id: &GraphTwinId,
) -> Result<CommandOutcome, SyncError> {
    let mut vertex = None;
    for attempt in 1..=MAX_ADD_OR_GET_ATTEMPTS {
        vertex = match graph
            .add_vertex(DEVICE_LABEL, id.as_str(), &Properties::new())
            .await
        {
            Ok(added) => added,
            Err(e) if e.is_conflict() => {
                info!(id = %id, "vertex already exists, fetching it");
                graph.get_vertex_by_id(id.as_str()).await?
            }
            Err(e) => return Err(e.into()),
        };
        if vertex.is_some() {
            break;
        }
        debug!(id = %id, attempt, "vertex neither added nor found, retrying");
    }
    let Some(vertex) = vertex else {
        return Err(SyncError::VertexUnavailable { id: id.to_string() });
    };

    if let Some(temperature) = parse_reported_temperature(&change.twin) {
        let mut properties = Properties::new();
        properties.insert(TEMPERATURE_PROPERTY.to_owned(), temperature);
        graph
            .update_vertex_properties(&vertex.id, &properties)
            .await?;
    }
    if let Some(location) = parse_tagged_location(&change.twin) {
        LocationResolver::new(graph)
            .replace_location(&vertex, &location)
            .await?;
    }
    Ok(CommandOutcome::Applied)
}

async fn create<S: GraphStore>(
    graph: &GraphClient<S>,
    change: &TwinChange,
    id: &GraphTwinId,
) -> Result<CommandOutcome, SyncError> {
    let version = parse_version(&change.twin).unwrap_or_else(|| {
        warn!(id = %id, "twin has no integer version, storing 0");
        0
    });

    let mut properties = Properties::new();
    properties.insert(VERSION_PROPERTY.to_owned(), version.to_string());
    if let Some(temperature) = parse_reported_temperature(&change.twin) {
        properties.insert(TEMPERATURE_PROPERTY.to_owned(), temperature);
    }

    info!(id = %id, version, "creating vertex");
    let vertex = match graph.add_vertex(DEVICE_LABEL, id.as_str(), &properties).await {
        Ok(vertex) => vertex,
        Err(e) if e.is_conflict() => {
            info!(id = %id, "vertex already exists");
            return Ok(CommandOutcome::AlreadyExists);
        }
        Err(e) => return Err(e.into()),
    };

    if let (Some(vertex), Some(location)) = (vertex, parse_tagged_location(&change.twin)) {
        LocationResolver::new(graph)
            .replace_location(&vertex, &location)
            .await?;
    }
    Ok(CommandOutcome::Applied)
}

async fn update<S: GraphStore>(
    graph: &GraphClient<S>,
    change: &TwinChange,
    id: &GraphTwinId,
) -> Result<CommandOutcome, SyncError> {
    let Some(vertex) = graph.get_vertex_by_id(id.as_str()).await? else {
        info!(id = %id, "vertex does not exist");
        return Ok(CommandOutcome::NotFound);
    };

    if let Some(temperature) = parse_reported_temperature(&change.twin) {
        info!(id = %id, temperature, "updating temperature");
        let mut properties = Properties::new();
        properties.insert(TEMPERATURE_PROPERTY.to_owned(), temperature);
        graph
            .update_vertex_properties(&vertex.id, &properties)
            .await?;
    }
    if let Some(patch) = parse_tagged_location(&change.twin) {
        LocationResolver::new(graph)
            .update_location(&vertex, &patch)
            .await?;
    }
    Ok(CommandOutcome::Applied)
}

async fn replace<S: GraphStore>(
    graph: &GraphClient<S>,
    change: &TwinChange,
    vertex: &Vertex,
) -> Result<CommandOutcome, SyncError> {
    let current = vertex
        .property_string(VERSION_PROPERTY)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0);
    let incoming = parse_version(&change.twin);

    let Some(version) = incoming.filter(|&v| v > current) else {
        if incoming.is_none() {
            warn!(id = vertex.id, "twin has no integer version");
        }
        info!(id = vertex.id, current, incoming = ?incoming, "no update required");
        return Ok(CommandOutcome::StaleVersion { current, incoming });
    };

    let mut properties = Properties::new();
    properties.insert(VERSION_PROPERTY.to_owned(), version.to_string());
    if let Some(temperature) = parse_reported_temperature(&change.twin) {
        properties.insert(TEMPERATURE_PROPERTY.to_owned(), temperature);
    }
    info!(id = vertex.id, current, version, "updating vertex");
    graph
        .update_vertex_properties(&vertex.id, &properties)
        .await?;

    if let Some(location) = parse_tagged_location(&change.twin) {
        LocationResolver::new(graph)
            .replace_location(vertex, &location)
            .await?;
    }
    Ok(CommandOutcome::Applied)
}

async fn delete<S: GraphStore>(
    graph: &GraphClient<S>,
    id: &GraphTwinId,
) -> Result<CommandOutcome, SyncError> {
    info!(id = %id, "dropping vertex");
    graph.drop_vertex(id.as_str()).await?;
    Ok(CommandOutcome::Deleted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn graph_twin_id_joins_hub_and_twin() {
        let change = TwinChange::new("hub", "t1", Value::Null);
        assert_eq!(change.graph_twin_id().as_str(), "hub-t1");
    }

    #[test]
    fn every_variant_exposes_its_change() {
        let change = TwinChange::new("hub", "t1", json!({"version": 1}));
        let commands = [
            SyncCommand::AddOrGet(change.clone()),
            SyncCommand::Create(change.clone()),
            SyncCommand::Update(change.clone()),
            SyncCommand::Replace(change.clone()),
            SyncCommand::Delete(change.clone()),
            SyncCommand::CreateOrUpdate(change.clone()),
        ];
        let names: Vec<_> = commands.iter().map(SyncCommand::name).collect();
        assert_eq!(
            names,
            ["add_or_get", "create", "update", "replace", "delete", "create_or_update"]
        );
        assert!(commands.iter().all(|c| *c.change() == change));
    }
}

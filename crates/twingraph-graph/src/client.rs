//! Mutation client the sync commands talk to.
//!
//! [`GraphClient`] wraps a [`GraphStore`] and turns its paged results into
//! "first record or nothing". Each store call runs under a timeout so a
//! hung store surfaces as a retryable [`GraphError::Timeout`] instead of
//! blocking the partition forever.

use std::time::Duration;

use futures::StreamExt as _;
use tracing::debug;
use twingraph_types::{Edge, Record, Vertex};

use crate::error::{GraphError, StoreError};
use crate::query::{
    ADDRESS_PROPERTY, BUILDING_LABEL, FLOOR_LABEL, GraphQuery, NAME_PROPERTY, Properties,
    ROOM_LABEL,
};
use crate::store::{GraphStore, ResultPages};

/// Default per-query timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes the engine's query vocabulary against a graph store.
#[derive(Debug)]
pub struct GraphClient<S> {
    store: S,
    timeout: Duration,
}

impl<S: GraphStore> GraphClient<S> {
    /// Create a client with the given per-query timeout.
    pub const fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Create a client with [`DEFAULT_QUERY_TIMEOUT`].
    pub const fn with_default_timeout(store: S) -> Self {
        Self::new(store, DEFAULT_QUERY_TIMEOUT)
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Execute a query and return the first record of the first non-empty
    /// result page.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Conflict`] if the store reports that the target
    /// id already exists, [`GraphError::Timeout`] if the store does not
    /// answer in time, and [`GraphError::Store`] for any other failure.
    pub async fn execute(&self, query: &GraphQuery) -> Result<Option<Record>, GraphError> {
        let script = query.to_script();
        debug!(
            gremlin = %script.gremlin,
            bindings = ?script.bindings,
            "executing graph query"
        );

        let pages = self.store.submit(query);
        match tokio::time::timeout(self.timeout, first_record(pages)).await {
            Ok(Ok(record)) => {
                debug!(record = ?record, "graph query result");
                Ok(record)
            }
            Ok(Err(StoreError::Conflict { message })) => {
                let id = query.target_id().unwrap_or_default().to_owned();
                debug!(id = id, message = message, "graph store reported conflict");
                Err(GraphError::Conflict { id })
            }
            Ok(Err(StoreError::Backend { message })) => Err(GraphError::Store { message }),
            Err(_) => Err(GraphError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Add a vertex with an explicit id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Conflict`] if the id is taken.
    pub async fn add_vertex(
        &self,
        label: &str,
        id: &str,
        properties: &Properties,
    ) -> Result<Option<Vertex>, GraphError> {
        let query = GraphQuery::AddVertex {
            label: label.to_owned(),
            id: id.to_owned(),
            properties: properties.clone(),
        };
        vertex_result(self.execute(&query).await?)
    }

    /// Fetch a vertex by id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the query fails.
    pub async fn get_vertex_by_id(&self, id: &str) -> Result<Option<Vertex>, GraphError> {
        let query = GraphQuery::GetVertex { id: id.to_owned() };
        vertex_result(self.execute(&query).await?)
    }

    /// Set properties on a vertex and return the updated vertex.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the query fails.
    pub async fn update_vertex_properties(
        &self,
        id: &str,
        properties: &Properties,
    ) -> Result<Option<Vertex>, GraphError> {
        let query = GraphQuery::UpdateProperties {
            id: id.to_owned(),
            properties: properties.clone(),
        };
        vertex_result(self.execute(&query).await?)
    }

    /// Drop a vertex. Dropping an absent vertex succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the query fails.
    pub async fn drop_vertex(&self, id: &str) -> Result<(), GraphError> {
        self.execute(&GraphQuery::DropVertex { id: id.to_owned() })
            .await
            .map(|_| ())
    }

    /// Run an edge-producing traversal and return its first edge.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnexpectedRecord`] if the traversal yields a
    /// vertex.
    pub async fn get_edge(&self, query: &GraphQuery) -> Result<Option<Edge>, GraphError> {
        edge_result(self.execute(query).await?)
    }

    /// First outgoing edge of `vertex_id` with the given label.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the query fails.
    pub async fn out_edge(&self, vertex_id: &str, label: &str) -> Result<Option<Edge>, GraphError> {
        self.get_edge(&GraphQuery::OutEdge {
            vertex_id: vertex_id.to_owned(),
            label: label.to_owned(),
        })
        .await
    }

    /// Drop every outgoing edge of `vertex_id` with the given label.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the query fails.
    pub async fn drop_out_edges(&self, vertex_id: &str, label: &str) -> Result<(), GraphError> {
        self.execute(&GraphQuery::DropOutEdges {
            vertex_id: vertex_id.to_owned(),
            label: label.to_owned(),
        })
        .await
        .map(|_| ())
    }

    /// Add a directed edge between two vertices.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the query fails.
    pub async fn add_edge(
        &self,
        from_id: &str,
        to_id: &str,
        label: &str,
    ) -> Result<Option<Edge>, GraphError> {
        let query = GraphQuery::AddEdge {
            from_id: from_id.to_owned(),
            to_id: to_id.to_owned(),
            label: label.to_owned(),
        };
        edge_result(self.execute(&query).await?)
    }

    /// Find the room `room` on floor `floor` of the building at `building`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the query fails.
    pub async fn find_room(
        &self,
        building: &str,
        floor: &str,
        room: &str,
    ) -> Result<Option<Vertex>, GraphError> {
        let query = GraphQuery::FindRoom {
            building: building.to_owned(),
            floor: floor.to_owned(),
            room: room.to_owned(),
        };
        vertex_result(self.execute(&query).await?)
    }

    /// The room a device is located in.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the query fails.
    pub async fn room_of(&self, device_id: &str) -> Result<Option<Vertex>, GraphError> {
        self.located_parent(device_id, ROOM_LABEL, NAME_PROPERTY).await
    }

    /// The floor a room is located on.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the query fails.
    pub async fn floor_of(&self, room_id: &str) -> Result<Option<Vertex>, GraphError> {
        self.located_parent(room_id, FLOOR_LABEL, NAME_PROPERTY).await
    }

    /// The building a floor belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the query fails.
    pub async fn building_of(&self, floor_id: &str) -> Result<Option<Vertex>, GraphError> {
        self.located_parent(floor_id, BUILDING_LABEL, ADDRESS_PROPERTY)
            .await
    }

    async fn located_parent(
        &self,
        vertex_id: &str,
        label: &str,
        property: &str,
    ) -> Result<Option<Vertex>, GraphError> {
        let query = GraphQuery::LocatedParent {
            vertex_id: vertex_id.to_owned(),
            label: label.to_owned(),
            property: property.to_owned(),
        };
        vertex_result(self.execute(&query).await?)
    }
}

/// Drain pages until one yields a record.
async fn first_record(mut pages: ResultPages<'_>) -> Result<Option<Record>, StoreError> {
    while let Some(page) = pages.next().await {
        if let Some(record) = page?.into_iter().next() {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

fn vertex_result(record: Option<Record>) -> Result<Option<Vertex>, GraphError> {
    record
        .map(|r| {
            r.into_vertex()
                .ok_or(GraphError::UnexpectedRecord { expected: "vertex" })
        })
        .transpose()
}

fn edge_result(record: Option<Record>) -> Result<Option<Edge>, GraphError> {
    record
        .map(|r| {
            r.into_edge()
                .ok_or(GraphError::UnexpectedRecord { expected: "edge" })
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use futures::StreamExt as _;
    use twingraph_types::Vertex;

    use super::*;

    /// Store returning a fixed sequence of pages for every query.
    struct PagedStore {
        pages: Vec<Result<Vec<Record>, StoreError>>,
    }

    impl GraphStore for PagedStore {
        fn submit<'a>(&'a self, _query: &'a GraphQuery) -> ResultPages<'a> {
            futures::stream::iter(self.pages.clone()).boxed()
        }
    }

    /// Store that never answers.
    struct HungStore;

    impl GraphStore for HungStore {
        fn submit<'a>(&'a self, _query: &'a GraphQuery) -> ResultPages<'a> {
            futures::stream::pending().boxed()
        }
    }

    fn vertex(id: &str) -> Record {
        Record::Vertex(Vertex {
            id: id.to_owned(),
            label: "thermostat".to_owned(),
            properties: BTreeMap::new(),
        })
    }

    fn get(id: &str) -> GraphQuery {
        GraphQuery::GetVertex { id: id.to_owned() }
    }

    #[tokio::test]
    async fn returns_first_record_of_first_non_empty_page() {
        let client = GraphClient::with_default_timeout(PagedStore {
            pages: vec![Ok(vec![]), Ok(vec![vertex("a"), vertex("b")]), Ok(vec![vertex("c")])],
        });
        let record = client.execute(&get("a")).await.unwrap();
        assert_eq!(record.map(|r| r.id().to_owned()).as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn empty_results_yield_none() {
        let client = GraphClient::with_default_timeout(PagedStore {
            pages: vec![Ok(vec![]), Ok(vec![])],
        });
        assert!(client.execute(&get("a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conflict_is_reported_with_target_id() {
        let client = GraphClient::with_default_timeout(PagedStore {
            pages: vec![Err(StoreError::Conflict {
                message: "Resource with specified id already exists".to_owned(),
            })],
        });
        let err = client
            .add_vertex("thermostat", "hub-t1", &Properties::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::Conflict {
                id: "hub-t1".to_owned()
            }
        );
        assert!(err.is_conflict());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let client = GraphClient::with_default_timeout(PagedStore {
            pages: vec![Err(StoreError::Backend {
                message: "request rate too large".to_owned(),
            })],
        });
        let err = client.get_vertex_by_id("a").await.unwrap_err();
        assert!(matches!(err, GraphError::Store { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_store_times_out() {
        let client = GraphClient::new(HungStore, Duration::from_millis(250));
        let err = client.get_vertex_by_id("a").await.unwrap_err();
        assert_eq!(err, GraphError::Timeout { timeout_ms: 250 });
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn edge_query_rejects_vertex_record() {
        let client = GraphClient::with_default_timeout(PagedStore {
            pages: vec![Ok(vec![vertex("a")])],
        });
        let err = client.out_edge("a", "located").await.unwrap_err();
        assert_eq!(err, GraphError::UnexpectedRecord { expected: "edge" });
    }
}

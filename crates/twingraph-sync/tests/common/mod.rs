//! Shared fixtures for the sync integration tests.

#![allow(
    dead_code,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc
)]

use std::sync::atomic::{AtomicU32, Ordering};

use futures::StreamExt as _;
use serde_json::Value;
use twingraph_graph::{
    GraphClient, GraphQuery, GraphStore, InMemoryGraph, ResultPages, StoreError, seed_topology,
};
use twingraph_types::{ChangeEvent, MessageSource, OperationType};

/// Hub every fixture device belongs to.
pub const HUB: &str = "hub";

/// A graph client over an in-memory graph with the building topology.
pub async fn seeded_graph() -> GraphClient<InMemoryGraph> {
    let graph = GraphClient::with_default_timeout(InMemoryGraph::new());
    seed_topology(&graph).await.expect("seed topology");
    graph
}

/// In-memory graph that fails every query aimed at one vertex id.
#[derive(Debug)]
pub struct FailingStore {
    inner: InMemoryGraph,
    poison: String,
    remaining_failures: AtomicU32,
}

impl FailingStore {
    /// Fail queries targeting `poison` forever.
    pub fn new(poison: &str) -> Self {
        Self::failing_times(poison, u32::MAX)
    }

    /// Fail queries targeting `poison` the first `times` times.
    pub fn failing_times(poison: &str, times: u32) -> Self {
        Self {
            inner: InMemoryGraph::new(),
            poison: poison.to_owned(),
            remaining_failures: AtomicU32::new(times),
        }
    }

    /// The wrapped graph.
    pub const fn inner(&self) -> &InMemoryGraph {
        &self.inner
    }

    fn should_fail(&self, query: &GraphQuery) -> bool {
        query.target_id() == Some(self.poison.as_str())
            && self
                .remaining_failures
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok()
    }
}

impl GraphStore for FailingStore {
    fn submit<'a>(&'a self, query: &'a GraphQuery) -> ResultPages<'a> {
        if self.should_fail(query) {
            return futures::stream::iter([Err(StoreError::Backend {
                message: "service unavailable".to_owned(),
            })])
            .boxed();
        }
        self.inner.submit(query)
    }
}

/// A change event for device `device` at `offset`.
pub fn event(
    source: MessageSource,
    operation: OperationType,
    device: &str,
    payload: Value,
    offset: u64,
) -> ChangeEvent {
    ChangeEvent {
        hub_name: HUB.to_owned(),
        device_id: device.to_owned(),
        message_source: source,
        operation_type: operation,
        payload,
        sequence_offset: offset,
        enqueued_at: None,
    }
}

/// A `createDeviceIdentity` lifecycle event.
pub fn created(device: &str, payload: Value, offset: u64) -> ChangeEvent {
    event(
        MessageSource::DeviceLifecycle,
        OperationType::CreateDeviceIdentity,
        device,
        payload,
        offset,
    )
}

/// A `replaceTwin` change event.
pub fn replaced(device: &str, payload: Value, offset: u64) -> ChangeEvent {
    event(
        MessageSource::TwinChange,
        OperationType::ReplaceTwin,
        device,
        payload,
        offset,
    )
}

/// Graph id of a fixture device.
pub fn vertex_id(device: &str) -> String {
    format!("{HUB}-{device}")
}

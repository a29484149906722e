//! Twin-to-graph synchronization engine.
//!
//! Consumes device twin change notifications from NATS JetStream and
//! mirrors them into a property graph of buildings, floors, rooms and
//! devices. A one-shot `sync` mode reconciles the graph from a twin
//! listing instead.
//!
//! # Architecture
//!
//! ```text
//! JetStream (per partition) --> EventBatchProcessor --> SyncCommand --> Gremlin Server
//!            ^                          |
//!            +--------- ack ------------+
//! ```
//!
//! Usage: `twingraph-engine [notifications|sync]`. Configuration is read
//! from environment variables; see [`config::EngineConfig::from_env`].

mod config;
mod error;
mod nats;
mod service;

use tracing::info;
use tracing_subscriber::EnvFilter;
use twingraph_graph::{GremlinHttpStore, InMemoryGraph};

use crate::config::{EngineConfig, GraphBackend, Mode};

/// Application entry point.
///
/// Initializes logging, loads configuration, then runs the selected mode
/// against the configured graph store.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the selected mode
/// fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let instance = uuid::Uuid::now_v7();
    info!(instance = %instance, "twingraph-engine starting");

    let mode = Mode::from_args(std::env::args().skip(1))?;
    let config = EngineConfig::from_env(mode)?;
    info!(
        mode = ?config.mode,
        backend = ?config.graph_backend,
        query_timeout_ms = config.query_timeout.as_millis(),
        partitions = ?config.partitions,
        "configuration loaded"
    );

    match &config.graph_backend {
        GraphBackend::Gremlin { url } => service::run(&config, GremlinHttpStore::new(url)).await?,
        GraphBackend::Memory => service::run(&config, InMemoryGraph::new()).await?,
    }

    info!("twingraph-engine stopped");
    Ok(())
}

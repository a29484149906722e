//! The two engine modes.
//!
//! Notifications mode serves every configured partition until Ctrl-C.
//! Sync mode pushes a twin listing through Create-or-Update once.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};
use twingraph_graph::{GraphClient, GraphStore, SeedOutcome, seed_topology};
use twingraph_sync::{ProcessorRegistry, spawn_partitions, sync_twins};
use twingraph_types::TwinSnapshot;

use crate::config::{EngineConfig, Mode};
use crate::error::EngineError;
use crate::nats::{self, ConsumerSettings, JetStreamSource};

/// Run the configured mode against `store`.
///
/// # Errors
///
/// Returns [`EngineError`] if startup fails or, in sync mode, if any twin
/// failed to sync.
pub async fn run<S: GraphStore + 'static>(
    config: &EngineConfig,
    store: S,
) -> Result<(), EngineError> {
    let graph = GraphClient::new(store, config.query_timeout);

    if config.seed_topology {
        match seed_topology(&graph).await? {
            SeedOutcome::Created => info!("topology seeded"),
            SeedOutcome::AlreadySeeded => info!("topology already present"),
        }
    }

    match config.mode {
        Mode::Notifications => run_notifications(config, Arc::new(graph)).await,
        Mode::Sync => run_sync(config, &graph).await,
    }
}

async fn run_notifications<S: GraphStore + 'static>(
    config: &EngineConfig,
    graph: Arc<GraphClient<S>>,
) -> Result<(), EngineError> {
    let url = config
        .nats_url
        .as_deref()
        .ok_or_else(|| EngineError::Config("missing required env var NATS_URL".to_owned()))?;
    let js = nats::connect(url).await?;

    let settings = ConsumerSettings {
        stream: config.stream.clone(),
        consumer_name: config.consumer_name.clone(),
        batch_size: config.batch_size,
        batch_expires: config.batch_expires,
    };
    let mut sources = Vec::with_capacity(config.partitions.len());
    for partition in &config.partitions {
        sources.push(JetStreamSource::open(&js, &settings, partition).await?);
    }

    let registry = Arc::new(ProcessorRegistry::new());
    let handles = spawn_partitions(sources, &graph, config.processor, &registry);
    info!(
        partitions = handles.len(),
        stream = config.stream,
        "serving twin change notifications"
    );

    let aborts: Vec<_> = handles.iter().map(tokio::task::JoinHandle::abort_handle).collect();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!(active = registry.active(), "shutting down");
            for abort in aborts {
                abort.abort();
            }
        }
        results = join_all(handles) => {
            for result in results {
                if let Err(e) = result {
                    error!(error = %e, "partition task failed");
                }
            }
            warn!("all partitions closed");
        }
    }

    info!(opened = registry.opened(), "partition processors stopped");
    Ok(())
}

async fn run_sync<S: GraphStore>(
    config: &EngineConfig,
    graph: &GraphClient<S>,
) -> Result<(), EngineError> {
    let path = config
        .twins_file
        .as_deref()
        .ok_or_else(|| EngineError::Config("missing required env var TWINS_FILE".to_owned()))?;
    let listing = tokio::fs::read_to_string(path).await?;
    let twins: Vec<TwinSnapshot> = serde_json::from_str(&listing)?;
    info!(path, twins = twins.len(), "syncing twin listing");

    let summary = sync_twins(graph, twins).await;
    if summary.failed > 0 {
        return Err(EngineError::SyncIncomplete {
            failed: summary.failed,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use twingraph_graph::InMemoryGraph;
    use twingraph_graph::query::DEVICE_LABEL;
    use twingraph_sync::ProcessorConfig;

    use super::*;
    use crate::config::GraphBackend;

    fn sync_config(twins_file: &str) -> EngineConfig {
        EngineConfig {
            mode: Mode::Sync,
            graph_backend: GraphBackend::Memory,
            query_timeout: Duration::from_secs(1),
            seed_topology: true,
            nats_url: None,
            stream: "TWIN_CHANGES".to_owned(),
            consumer_name: "twin-graph-sync".to_owned(),
            partitions: vec!["0".to_owned()],
            batch_size: 10,
            batch_expires: Duration::from_secs(1),
            processor: ProcessorConfig::default(),
            twins_file: Some(twins_file.to_owned()),
        }
    }

    #[tokio::test]
    async fn sync_mode_reads_listing() {
        let path = std::env::temp_dir().join(format!("twins-{}.json", uuid::Uuid::now_v7()));
        let listing = serde_json::json!([
            {"hubName": "hub", "deviceId": "t1", "twin": {"version": 1,
                "tags": {"location": {"building": "43", "floor": "1", "room": "1R"}}}},
            {"hubName": "hub", "deviceId": "t2", "twin": {"version": 1}}
        ]);
        tokio::fs::write(&path, listing.to_string()).await.unwrap();

        let store = Arc::new(InMemoryGraph::new());
        let config = sync_config(&path.to_string_lossy());
        run(&config, Arc::clone(&store)).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(store.count_label(DEVICE_LABEL), 2);
        assert_eq!(store.out_edges("hub-t1", "located").len(), 1);
    }

    #[tokio::test]
    async fn sync_mode_rejects_missing_file() {
        let config = sync_config("/nonexistent/twins.json");
        let err = run(&config, InMemoryGraph::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }
}

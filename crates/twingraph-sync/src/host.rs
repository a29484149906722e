//! Partition hosting.
//!
//! Each partition is served by one sequential stream: fetch a batch,
//! process it to completion, fetch the next. Partitions run concurrently
//! as separate tasks and share the graph client read-only.
//!
//! [`ProcessorRegistry`] is the process-wide count of partition
//! processors. It is passed to every stream explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use twingraph_graph::{GraphClient, GraphStore};

use crate::processor::{EventBatchProcessor, ProcessorConfig, StatsSnapshot};
use crate::source::EventSource;

/// Counts of partition processors in this process.
#[derive(Debug, Default)]
pub struct ProcessorRegistry {
    opened: AtomicUsize,
    active: AtomicUsize,
}

impl ProcessorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor being opened. Returns its 1-based instance
    /// number.
    pub fn open(&self) -> usize {
        self.active.fetch_add(1, Ordering::AcqRel);
        self.opened.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Register a processor being closed.
    pub fn close(&self) {
        // Saturating decrement: a close without a matching open is ignored.
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Processors opened since startup.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::Acquire)
    }

    /// Processors currently running.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Serve one partition until its source closes.
///
/// Fetch failures are logged and retried after
/// [`ProcessorConfig::retry_delay`]. A rejected checkpoint abandons the
/// rest of that batch; the source redelivers it.
///
/// Returns the partition's counters at close.
pub async fn run_partition<E, S>(
    mut source: E,
    graph: Arc<GraphClient<S>>,
    config: ProcessorConfig,
    registry: Arc<ProcessorRegistry>,
) -> StatsSnapshot
where
    E: EventSource,
    S: GraphStore,
{
    let partition = source.partition_id().to_owned();
    let instance = registry.open();
    info!(partition, instance, active = registry.active(), "partition processor opened");

    let processor = EventBatchProcessor::new(partition.clone(), graph, config);
    loop {
        let batch = match source.next_batch().await {
            Ok(Some(batch)) => batch,
            Ok(None) => break,
            Err(e) => {
                warn!(partition, error = %e, "failed to fetch batch");
                tokio::time::sleep(config.retry_delay).await;
                continue;
            }
        };
        if batch.is_empty() {
            continue;
        }

        if let Err(e) = processor.process_batch(&mut source, batch).await {
            error!(partition, error = %e, "batch abandoned, awaiting redelivery");
        }
    }

    registry.close();
    let stats = processor.stats().snapshot();
    info!(
        partition,
        instance,
        applied = stats.applied,
        skipped = stats.skipped,
        failed_passes = stats.failed_passes,
        "partition processor closed"
    );
    stats
}

/// Spawn one [`run_partition`] task per source.
pub fn spawn_partitions<E, S>(
    sources: impl IntoIterator<Item = E>,
    graph: &Arc<GraphClient<S>>,
    config: ProcessorConfig,
    registry: &Arc<ProcessorRegistry>,
) -> Vec<JoinHandle<StatsSnapshot>>
where
    E: EventSource + 'static,
    S: GraphStore + 'static,
{
    sources
        .into_iter()
        .map(|source| {
            tokio::spawn(run_partition(
                source,
                Arc::clone(graph),
                config,
                Arc::clone(registry),
            ))
        })
        .collect()
}

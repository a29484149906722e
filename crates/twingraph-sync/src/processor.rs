//! Batch processing with prefix checkpoints.
//!
//! A batch is drained in passes. Each pass runs the pending events in
//! order until one fails. The source is checkpointed at the last event
//! that completed, the completed prefix is removed, and the remainder
//! (starting with the failed event) is retried on the next pass after
//! [`ProcessorConfig::retry_delay`].
//!
//! An event that fails on every attempt holds its partition on that event
//! indefinitely. Such stalls are counted in [`PartitionStats`] and escalate
//! from warnings to errors after [`ProcessorConfig::stall_alert_passes`]
//! consecutive passes without progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, error, warn};
use twingraph_graph::{GraphClient, GraphStore};
use twingraph_types::ChangeEvent;

use crate::dispatcher::CommandDispatcher;
use crate::error::{ProcessorError, SyncError};
use crate::source::EventSource;

/// Default delay between passes over a failing batch.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default number of stalled passes before a stall is logged as an error.
pub const DEFAULT_STALL_ALERT_PASSES: u32 = 10;

/// Tuning for [`EventBatchProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Delay before retrying after a failed pass.
    pub retry_delay: Duration,
    /// Consecutive passes without progress after which the stall is
    /// reported at error level.
    pub stall_alert_passes: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            stall_alert_passes: DEFAULT_STALL_ALERT_PASSES,
        }
    }
}

/// Per-partition counters.
///
/// Shared through [`Arc`] so operators and the host can read them while
/// the partition runs.
#[derive(Debug, Default)]
pub struct PartitionStats {
    applied: AtomicU64,
    skipped: AtomicU64,
    failed_passes: AtomicU64,
    checkpoints: AtomicU64,
    stalled_passes: AtomicU32,
}

/// Point-in-time copy of [`PartitionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Events whose command completed.
    pub applied: u64,
    /// Events with no matching command.
    pub skipped: u64,
    /// Passes that ended in a command failure.
    pub failed_passes: u64,
    /// Checkpoints recorded with the source.
    pub checkpoints: u64,
    /// Consecutive failed passes that completed no event.
    pub stalled_passes: u32,
}

impl PartitionStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            applied: self.applied.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed_passes: self.failed_passes.load(Ordering::Relaxed),
            checkpoints: self.checkpoints.load(Ordering::Relaxed),
            stalled_passes: self.stalled_passes.load(Ordering::Relaxed),
        }
    }

    /// Whether the partition is currently stuck on a failing event.
    pub fn is_stalled(&self) -> bool {
        self.stalled_passes.load(Ordering::Relaxed) > 0
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    fn record_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_checkpoint(&self) {
        self.checkpoints.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed pass and return the number of consecutive passes
    /// without progress.
    fn record_failed_pass(&self, made_progress: bool) -> u32 {
        self.failed_passes.fetch_add(1, Ordering::Relaxed);
        if made_progress {
            self.stalled_passes.store(0, Ordering::Relaxed);
            0
        } else {
            self.stalled_passes
                .fetch_add(1, Ordering::Relaxed)
                .saturating_add(1)
        }
    }

    fn clear_stall(&self) {
        self.stalled_passes.store(0, Ordering::Relaxed);
    }
}

/// Result of one pass over the pending events.
struct Pass {
    /// Number of leading events that completed.
    completed: usize,
    /// The command failure that ended the pass early, if any.
    failure: Option<SyncError>,
}

/// Applies batches of one partition's events to the graph.
#[derive(Debug)]
pub struct EventBatchProcessor<S> {
    partition_id: String,
    graph: Arc<GraphClient<S>>,
    config: ProcessorConfig,
    stats: Arc<PartitionStats>,
}

impl<S: GraphStore> EventBatchProcessor<S> {
    /// Create a processor for `partition_id` writing to `graph`.
    pub fn new(
        partition_id: impl Into<String>,
        graph: Arc<GraphClient<S>>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            partition_id: partition_id.into(),
            graph,
            config,
            stats: Arc::new(PartitionStats::new()),
        }
    }

    /// Id of the partition this processor serves.
    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    /// Shared handle to this processor's counters.
    pub fn stats(&self) -> Arc<PartitionStats> {
        Arc::clone(&self.stats)
    }

    /// Apply every event of `batch`, checkpointing each completed prefix.
    ///
    /// Returns only once the whole batch has been applied. A command that
    /// keeps failing keeps this call retrying it.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::Source`] if the source rejects a
    /// checkpoint. Events not yet checkpointed will be redelivered.
    pub async fn process_batch<E: EventSource>(
        &self,
        source: &mut E,
        batch: Vec<ChangeEvent>,
    ) -> Result<(), ProcessorError> {
        let mut pending = batch;
        debug!(partition = self.partition_id, events = pending.len(), "processing batch");

        while !pending.is_empty() {
            let pass = self.sync_pass(&pending).await;

            if let Some(last) = pass.completed.checked_sub(1).and_then(|i| pending.get(i)) {
                debug!(partition = self.partition_id, offset = last.sequence_offset, "checkpointing");
                source.checkpoint(last).await?;
                self.stats.record_checkpoint();
            }
            pending.drain(..pass.completed);

            let Some(failure) = pass.failure else {
                self.stats.clear_stall();
                continue;
            };

            let stalled = self.stats.record_failed_pass(pass.completed > 0);
            let offset = pending.first().map(|e| e.sequence_offset);
            if stalled >= self.config.stall_alert_passes {
                error!(
                    partition = self.partition_id,
                    offset = ?offset,
                    stalled_passes = stalled,
                    remaining = pending.len(),
                    error = %failure,
                    "partition stalled on failing event"
                );
            } else {
                warn!(
                    partition = self.partition_id,
                    offset = ?offset,
                    remaining = pending.len(),
                    error = %failure,
                    "sync pass failed, retrying remaining events"
                );
            }
            tokio::time::sleep(self.config.retry_delay).await;
        }
        Ok(())
    }

    /// Run pending events in order until one fails.
    async fn sync_pass(&self, pending: &[ChangeEvent]) -> Pass {
        let mut completed: usize = 0;
        for event in pending {
            let Some(command) = CommandDispatcher::for_event(event) else {
                self.stats.record_skipped();
                completed = completed.saturating_add(1);
                continue;
            };

            match command.run(&self.graph).await {
                Ok(outcome) => {
                    debug!(
                        partition = self.partition_id,
                        offset = event.sequence_offset,
                        command = command.name(),
                        outcome = ?outcome,
                        "event applied"
                    );
                    self.stats.record_applied();
                    completed = completed.saturating_add(1);
                }
                Err(failure) => {
                    return Pass {
                        completed,
                        failure: Some(failure),
                    };
                }
            }
        }
        Pass {
            completed,
            failure: None,
        }
    }
}

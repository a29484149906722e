//! The event source collaborator.
//!
//! An event source delivers the change events of one partition in ordered
//! batches and records checkpoints. Delivery is at least once: anything
//! after the last checkpoint may be delivered again.

use std::collections::VecDeque;
use std::future::Future;

use twingraph_types::ChangeEvent;

use crate::error::SourceError;

/// Ordered batches of change events for a single partition.
///
/// [`next_batch`] and [`checkpoint`] are never called concurrently for the
/// same source; the partition stream owns it exclusively.
///
/// [`next_batch`]: EventSource::next_batch
/// [`checkpoint`]: EventSource::checkpoint
pub trait EventSource: Send {
    /// Id of the partition this source reads.
    fn partition_id(&self) -> &str;

    /// The next batch of events, or `None` once the partition is closed.
    ///
    /// An empty batch means nothing arrived within the source's wait
    /// window.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fetch`] if the batch could not be read.
    fn next_batch(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<ChangeEvent>>, SourceError>> + Send;

    /// Record that `event` and every event before it in this partition have
    /// been applied.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Checkpoint`] if the checkpoint could not be
    /// persisted.
    fn checkpoint(
        &mut self,
        event: &ChangeEvent,
    ) -> impl Future<Output = Result<(), SourceError>> + Send;
}

/// An event source replaying preloaded batches.
///
/// The partition closes once every batch has been handed out. Checkpointed
/// offsets are kept in call order.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    partition_id: String,
    batches: VecDeque<Vec<ChangeEvent>>,
    checkpoints: Vec<u64>,
}

impl ReplaySource {
    /// Create a source for `partition_id` that yields `batches` in order.
    pub fn new(partition_id: impl Into<String>, batches: Vec<Vec<ChangeEvent>>) -> Self {
        Self {
            partition_id: partition_id.into(),
            batches: batches.into(),
            checkpoints: Vec::new(),
        }
    }

    /// Offsets passed to [`EventSource::checkpoint`], oldest first.
    pub fn checkpoints(&self) -> &[u64] {
        &self.checkpoints
    }
}

impl EventSource for ReplaySource {
    fn partition_id(&self) -> &str {
        &self.partition_id
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<ChangeEvent>>, SourceError> {
        Ok(self.batches.pop_front())
    }

    async fn checkpoint(&mut self, event: &ChangeEvent) -> Result<(), SourceError> {
        self.checkpoints.push(event.sequence_offset);
        Ok(())
    }
}

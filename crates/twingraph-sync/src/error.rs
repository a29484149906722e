//! Error types for twin synchronization.
//!
//! Recoverable conditions (conflict on create, missing vertex, stale
//! version, invalid location, malformed field, unsupported operation) are
//! handled inside commands and never appear here. What remains are genuine
//! failures that stop a batch pass and cause a retry.

use twingraph_graph::GraphError;

/// Errors that fail a sync command.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A graph query failed.
    #[error("graph error: {source}")]
    Graph {
        /// The underlying graph error.
        #[from]
        source: GraphError,
    },

    /// The device vertex could neither be created nor fetched.
    #[error("vertex {id} could not be created or fetched")]
    VertexUnavailable {
        /// Graph id of the device vertex.
        id: String,
    },
}

/// Errors reported by an event source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Fetching the next batch failed.
    #[error("failed to fetch batch for partition {partition}: {message}")]
    Fetch {
        /// Partition id.
        partition: String,
        /// Description of the failure.
        message: String,
    },

    /// Recording a checkpoint failed.
    #[error("failed to checkpoint partition {partition} at offset {offset}: {message}")]
    Checkpoint {
        /// Partition id.
        partition: String,
        /// Offset of the event being checkpointed.
        offset: u64,
        /// Description of the failure.
        message: String,
    },
}

/// Errors that abort processing of a batch.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// The event source rejected a checkpoint.
    #[error("event source error: {source}")]
    Source {
        /// The underlying source error.
        #[from]
        source: SourceError,
    },
}

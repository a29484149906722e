//! Error types for the engine binary.
//!
//! Uses `thiserror` for typed errors covering configuration, NATS
//! connectivity, the graph store, and the twin listing file.

use twingraph_graph::GraphError;

/// Errors that stop the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Failed to connect to or communicate with NATS.
    #[error("NATS error: {0}")]
    Nats(String),

    /// A graph operation failed outside the batch path.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// The twin listing could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The twin listing is not valid JSON.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Some twins failed to sync.
    #[error("{failed} twin(s) failed to sync")]
    SyncIncomplete {
        /// Number of failed twins.
        failed: usize,
    },
}

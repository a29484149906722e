//! Error types for graph store access.
//!
//! [`StoreError`] is what a [`GraphStore`](crate::GraphStore) reports.
//! [`GraphError`] is what [`GraphClient`](crate::GraphClient) callers see:
//! store failures plus the client's own timeout and record-shape checks.

/// Errors reported by a graph store implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A vertex or edge with the same id already exists.
    #[error("conflict: {message}")]
    Conflict {
        /// Store-provided description.
        message: String,
    },

    /// Any other store-side or transport failure.
    #[error("graph store error: {message}")]
    Backend {
        /// Store-provided description.
        message: String,
    },
}

/// Errors surfaced by [`GraphClient`](crate::GraphClient).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The target id already exists. Callers treat this as "already applied".
    #[error("graph element {id} already exists")]
    Conflict {
        /// Id the query tried to create.
        id: String,
    },

    /// The store failed the query.
    #[error("graph store error: {message}")]
    Store {
        /// Store-provided description.
        message: String,
    },

    /// The store did not answer within the configured timeout.
    #[error("graph query timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// An edge survived a drop of its vertex's outgoing edges.
    #[error("{label} edge {edge_id} of {vertex_id} is still present after drop")]
    EdgeNotDropped {
        /// Source vertex id.
        vertex_id: String,
        /// Edge label.
        label: String,
        /// Id of the surviving edge.
        edge_id: String,
    },

    /// The first record was not of the kind the query produces.
    #[error("expected a {expected} record from the graph store")]
    UnexpectedRecord {
        /// The record kind that was expected.
        expected: &'static str,
    },
}

impl GraphError {
    /// Whether this is a uniqueness conflict.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether retrying the same query later may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store { .. } | Self::Timeout { .. } | Self::EdgeNotDropped { .. }
        )
    }
}

//! Twin change synchronization for the device topology graph.
//!
//! This crate turns device-twin change events into graph mutations. Events
//! arrive in ordered batches per partition, possibly redelivered, and are
//! applied with version gating, conflict tolerance, and checkpointing of
//! every successfully applied prefix.
//!
//! # Architecture
//!
//! ```text
//! EventSource --> EventBatchProcessor --> CommandDispatcher --> SyncCommand
//!      ^                   |                                      |
//!      +---- checkpoint ---+                 GraphClient <--------+
//!                                            LocationResolver <---+
//! ```
//!
//! # Modules
//!
//! - [`twin`] -- Field extraction from twin documents
//! - [`location`] -- [`LocationResolver`]: replace / patch a device's room
//! - [`command`] -- [`SyncCommand`] variants and their outcomes
//! - [`dispatcher`] -- [`CommandDispatcher`]: event to command mapping
//! - [`source`] -- [`EventSource`] collaborator trait
//! - [`processor`] -- [`EventBatchProcessor`]: batch drain with checkpoints
//! - [`host`] -- One processing stream per partition
//! - [`bulk`] -- One-shot Create-or-Update sync of a twin listing
//! - [`error`] -- Shared error types

pub mod bulk;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod location;
pub mod processor;
pub mod source;
pub mod twin;

// Re-export primary types for convenience.
pub use bulk::{BulkSyncSummary, sync_twins};
pub use command::{CommandOutcome, SyncCommand, TwinChange};
pub use dispatcher::CommandDispatcher;
pub use error::{ProcessorError, SourceError, SyncError};
pub use host::{ProcessorRegistry, run_partition, spawn_partitions};
pub use location::{LocationOutcome, LocationResolver};
pub use processor::{EventBatchProcessor, PartitionStats, ProcessorConfig, StatsSnapshot};
pub use source::{EventSource, ReplaySource};

//! Graph store access for the twin synchronization engine.
//!
//! The engine never writes free-form query text. Every command it sends is
//! one of the fixed shapes of [`GraphQuery`], rendered as a parameterized
//! Gremlin script so that device ids and reported values are passed as
//! bindings instead of being spliced into the traversal.
//!
//! # Architecture
//!
//! ```text
//! SyncCommand --> GraphClient --> GraphStore (trait)
//!                     |               |-- InMemoryGraph    (tests, local runs)
//!                     |               +-- GremlinHttpStore (Gremlin Server)
//!                     +-- timeout, first-record extraction, conflict mapping
//! ```
//!
//! # Modules
//!
//! - [`query`] -- The query vocabulary and its Gremlin rendering
//! - [`store`] -- The [`GraphStore`] collaborator trait
//! - [`client`] -- [`GraphClient`], the mutation client used by commands
//! - [`memory`] -- In-memory property graph implementing the vocabulary
//! - [`gremlin`] -- Gremlin Server HTTP store (`GraphSON` 1.0)
//! - [`topology`] -- Building / floor / room seeding
//! - [`error`] -- Shared error types

pub mod client;
pub mod error;
pub mod gremlin;
pub mod memory;
pub mod query;
pub mod store;
pub mod topology;

// Re-export primary types for convenience.
pub use client::GraphClient;
pub use error::{GraphError, StoreError};
pub use gremlin::GremlinHttpStore;
pub use memory::InMemoryGraph;
pub use query::{GraphQuery, Properties, Script};
pub use store::{GraphStore, ResultPages};
pub use topology::{SeedOutcome, seed_topology};

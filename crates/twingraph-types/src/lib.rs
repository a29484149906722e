//! Shared type definitions for the twin-to-graph synchronization engine.
//!
//! This crate is the single source of truth for the values that flow
//! between the event source, the sync commands, and the graph store.
//!
//! # Modules
//!
//! - [`ids`] -- The composite graph identity of a device twin
//! - [`location`] -- Building / floor / room location values
//! - [`events`] -- Change events delivered by the event source
//! - [`records`] -- Vertex and edge records returned by the graph store

pub mod events;
pub mod ids;
pub mod location;
pub mod records;

// Re-export all public types at crate root for convenience.
pub use events::{ChangeEvent, MessageSource, OperationType, TwinSnapshot};
pub use ids::GraphTwinId;
pub use location::Location;
pub use records::{Edge, Record, Vertex};

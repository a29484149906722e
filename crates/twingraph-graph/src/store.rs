//! The graph store collaborator.
//!
//! A store executes one [`GraphQuery`] and yields its results lazily, one
//! page at a time. Uniqueness violations are reported as
//! [`StoreError::Conflict`]; everything else as [`StoreError::Backend`].

use std::sync::Arc;

use futures::stream::BoxStream;
use twingraph_types::Record;

use crate::error::StoreError;
use crate::query::GraphQuery;

/// Lazy sequence of result pages produced by a query.
pub type ResultPages<'a> = BoxStream<'a, Result<Vec<Record>, StoreError>>;

/// A property graph that can execute the engine's query vocabulary.
///
/// The store is shared read-only by all partition streams, so
/// implementations must be safe to call concurrently.
pub trait GraphStore: Send + Sync {
    /// Submit a query and return its result pages.
    fn submit<'a>(&'a self, query: &'a GraphQuery) -> ResultPages<'a>;
}

impl<T: GraphStore + ?Sized> GraphStore for Arc<T> {
    fn submit<'a>(&'a self, query: &'a GraphQuery) -> ResultPages<'a> {
        (**self).submit(query)
    }
}

#[cfg(test)]
mod failing;
mod memory;
mod mongo;

use bson::Document;
use futures::future::BoxFuture;

use crate::error::DatabaseError;

#[cfg(test)]
pub(crate) use failing::FailingStore;
pub use memory::MemoryStore;

/// Parameters of a find call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub sort: Option<Document>,
    /// `None` returns every matching document.
    pub limit: Option<i64>,
}

/// Backend holding the collections of one logical database.
///
/// Implementations tag every failure with the operation and collection so that the
/// error text reaching a scenario names what went wrong.
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    fn find<'a>(&'a self, collection: &'a str, query: FindQuery) -> BoxFuture<'a, Result<Vec<Document>, DatabaseError>>;

    fn insert_many<'a>(&'a self, collection: &'a str, documents: Vec<Document>)
    -> BoxFuture<'a, Result<(), DatabaseError>>;

    fn count<'a>(&'a self, collection: &'a str, filter: Document) -> BoxFuture<'a, Result<u64, DatabaseError>>;

    fn delete_all<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<(), DatabaseError>>;
}

use std::{future::Future, sync::Arc, time::Duration};

use bson::Document;
use log::debug;

use crate::{
    error::{DatabaseError, Operation, StoreError},
    store::{DocumentStore, FindQuery},
};

/// One logical database registered to a [`Manager`](crate::Manager).
///
/// Wraps a [`DocumentStore`] with the collections truncated after every scenario and an
/// optional bound on each call.
#[derive(Debug, Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    clean_ups: Vec<String>,
    timeout: Option<Duration>,
}

impl Database {
    pub fn new(store: impl DocumentStore + 'static) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Wraps a store that is also held elsewhere, e.g. a [`MemoryStore`](crate::MemoryStore)
    /// inspected by tests.
    pub fn from_shared(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            clean_ups: Vec::new(),
            timeout: None,
        }
    }

    /// Adds collections to truncate after each scenario, in the given order.
    pub fn clean_up_after_scenario<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clean_ups.extend(collections.into_iter().map(Into::into));
        self
    }

    /// Bounds every call to the store.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn has_timeout(&self) -> bool {
        self.timeout.is_some()
    }

    pub fn clean_up_collections(&self) -> &[String] {
        &self.clean_ups
    }

    /// Finds documents matching `filter`. A `None` limit returns everything.
    pub async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<Document>, DatabaseError> {
        let query = FindQuery { filter, sort, limit };
        let docs = self
            .bounded(Operation::Find, collection, self.store.find(collection, query))
            .await?;

        debug!(collection = collection, found = docs.len(); "Found documents");
        Ok(docs)
    }

    pub async fn store(&self, collection: &str, documents: Vec<Document>) -> Result<(), DatabaseError> {
        let count = documents.len();
        self.bounded(Operation::Insert, collection, self.store.insert_many(collection, documents))
            .await?;

        debug!(collection = collection, count = count; "Stored documents");
        Ok(())
    }

    pub async fn count(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError> {
        self.bounded(Operation::Count, collection, self.store.count(collection, filter))
            .await
    }

    pub async fn truncate(&self, collection: &str) -> Result<(), DatabaseError> {
        self.bounded(Operation::Truncate, collection, self.store.delete_all(collection))
            .await?;

        debug!(collection = collection; "Truncated collection");
        Ok(())
    }

    /// Truncates the clean-up collections in order, stopping at the first failure.
    pub async fn clean_up(&self) -> Result<(), DatabaseError> {
        for collection in &self.clean_ups {
            self.truncate(collection).await?;
        }
        Ok(())
    }

    async fn bounded<T>(
        &self,
        operation: Operation,
        collection: &str,
        call: impl Future<Output = Result<T, DatabaseError>>,
    ) -> Result<T, DatabaseError> {
        let Some(timeout) = self.timeout else {
            return call.await;
        };

        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| DatabaseError::new(operation, collection, StoreError::Timeout(timeout)))?
    }
}

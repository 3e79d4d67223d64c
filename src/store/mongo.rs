use bson::{Document, doc};
use futures::{FutureExt, TryStreamExt, future::BoxFuture};

use super::{DocumentStore, FindQuery};
use crate::error::{DatabaseError, Operation};

/// The driver's database handle. Cursors are closed by the driver when dropped, so
/// close failures never reach the caller.
impl DocumentStore for mongodb::Database {
    fn find<'a>(&'a self, collection: &'a str, query: FindQuery) -> BoxFuture<'a, Result<Vec<Document>, DatabaseError>> {
        async move {
            let coll = self.collection::<Document>(collection);
            let mut action = coll.find(query.filter);
            if let Some(sort) = query.sort {
                action = action.sort(sort);
            }
            if let Some(limit) = query.limit {
                action = action.limit(limit);
            }

            let cursor = action
                .await
                .map_err(|e| DatabaseError::new(Operation::Find, collection, e))?;

            cursor
                .try_collect()
                .await
                .map_err(|e| DatabaseError::new(Operation::Read, collection, e))
        }
        .boxed()
    }

    fn insert_many<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> BoxFuture<'a, Result<(), DatabaseError>> {
        async move {
            self.collection::<Document>(collection)
                .insert_many(documents)
                .await
                .map_err(|e| DatabaseError::new(Operation::Insert, collection, e))?;
            Ok(())
        }
        .boxed()
    }

    fn count<'a>(&'a self, collection: &'a str, filter: Document) -> BoxFuture<'a, Result<u64, DatabaseError>> {
        async move {
            self.collection::<Document>(collection)
                .count_documents(filter)
                .await
                .map_err(|e| DatabaseError::new(Operation::Count, collection, e))
        }
        .boxed()
    }

    fn delete_all<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<(), DatabaseError>> {
        async move {
            self.collection::<Document>(collection)
                .delete_many(doc! {})
                .await
                .map_err(|e| DatabaseError::new(Operation::Truncate, collection, e))?;
            Ok(())
        }
        .boxed()
    }
}

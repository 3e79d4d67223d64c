use bson::Document;
use futures::{FutureExt, future::BoxFuture};

use super::{DocumentStore, FindQuery};
use crate::error::{DatabaseError, Operation, StoreError};

/// Store whose every call fails with `command failed`.
#[derive(Debug)]
pub(crate) struct FailingStore;

fn failed(operation: Operation, collection: &str) -> DatabaseError {
    DatabaseError::new(operation, collection, StoreError::Rejected("command failed".to_string()))
}

impl DocumentStore for FailingStore {
    fn find<'a>(&'a self, c: &'a str, _: FindQuery) -> BoxFuture<'a, Result<Vec<Document>, DatabaseError>> {
        async move { Err(failed(Operation::Find, c)) }.boxed()
    }

    fn insert_many<'a>(&'a self, c: &'a str, _: Vec<Document>) -> BoxFuture<'a, Result<(), DatabaseError>> {
        async move { Err(failed(Operation::Insert, c)) }.boxed()
    }

    fn count<'a>(&'a self, c: &'a str, _: Document) -> BoxFuture<'a, Result<u64, DatabaseError>> {
        async move { Err(failed(Operation::Count, c)) }.boxed()
    }

    fn delete_all<'a>(&'a self, c: &'a str) -> BoxFuture<'a, Result<(), DatabaseError>> {
        async move { Err(failed(Operation::Truncate, c)) }.boxed()
    }
}

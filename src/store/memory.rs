use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, doc, oid::ObjectId};
use futures::{FutureExt, future::BoxFuture};
use tokio::sync::RwLock;

use super::{DocumentStore, FindQuery};
use crate::error::{DatabaseError, Operation, StoreError};

/// In-process document store.
///
/// Filters support top-level equality only (a missing field equals `null`), and sorts
/// apply to top-level keys using MongoDB's cross-type ordering. Inserted documents
/// without an `_id` get a fresh `ObjectId`, and duplicate identifiers are rejected.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a collection in insertion order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

impl DocumentStore for MemoryStore {
    fn find<'a>(&'a self, collection: &'a str, query: FindQuery) -> BoxFuture<'a, Result<Vec<Document>, DatabaseError>> {
        async move {
            check_filter(&query.filter).map_err(|e| DatabaseError::new(Operation::Find, collection, e))?;

            let collections = self.collections.read().await;
            let mut found: Vec<Document> = collections
                .get(collection)
                .map(|docs| docs.iter().filter(|doc| matches_filter(doc, &query.filter)).cloned().collect())
                .unwrap_or_default();

            if let Some(sort) = &query.sort {
                found.sort_by(|a, b| compare_by_sort(a, b, sort));
            }
            if let Some(limit) = query.limit.filter(|limit| *limit != 0) {
                found.truncate(usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX));
            }

            Ok(found)
        }
        .boxed()
    }

    fn insert_many<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> BoxFuture<'a, Result<(), DatabaseError>> {
        async move {
            let reject = |message: String| DatabaseError::new(Operation::Insert, collection, StoreError::Rejected(message));

            if documents.is_empty() {
                return Err(reject("must provide at least one element in input slice".to_string()));
            }

            let mut collections = self.collections.write().await;
            let existing = collections.entry(collection.to_string()).or_default();

            let mut batch: Vec<Document> = Vec::with_capacity(documents.len());
            for document in documents {
                let document = with_object_id(document);
                let id = document.get("_id").cloned().unwrap_or(Bson::Null);
                let duplicate = existing
                    .iter()
                    .chain(batch.iter())
                    .any(|doc| doc.get("_id").is_some_and(|other| compare_bson(other, &id) == Ordering::Equal));
                if duplicate {
                    return Err(reject(format!(
                        "E11000 duplicate key error collection: {collection} index: _id_ dup key: {{ _id: {id} }}"
                    )));
                }
                batch.push(document);
            }

            existing.extend(batch);
            Ok(())
        }
        .boxed()
    }

    fn count<'a>(&'a self, collection: &'a str, filter: Document) -> BoxFuture<'a, Result<u64, DatabaseError>> {
        async move {
            check_filter(&filter).map_err(|e| DatabaseError::new(Operation::Count, collection, e))?;

            let collections = self.collections.read().await;
            let count = collections
                .get(collection)
                .map_or(0, |docs| docs.iter().filter(|doc| matches_filter(doc, &filter)).count());

            Ok(count as u64)
        }
        .boxed()
    }

    fn delete_all<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<(), DatabaseError>> {
        async move {
            self.collections.write().await.remove(collection);
            Ok(())
        }
        .boxed()
    }
}

fn with_object_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }

    let mut with_id = doc! { "_id": ObjectId::new() };
    for (key, value) in document {
        with_id.insert(key, value);
    }
    with_id
}

fn check_filter(filter: &Document) -> Result<(), StoreError> {
    for (key, value) in filter {
        let operator = if key.starts_with('$') {
            Some(key.as_str())
        } else {
            match value {
                Bson::Document(inner) => inner.keys().find(|k| k.starts_with('$')).map(String::as_str),
                _ => None,
            }
        };

        if let Some(operator) = operator {
            return Err(StoreError::Rejected(format!("unsupported query operator {operator}")));
        }
    }

    Ok(())
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| {
        let actual = document.get(key).unwrap_or(&Bson::Null);
        compare_bson(actual, expected) == Ordering::Equal
    })
}

fn compare_by_sort(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (key, direction) in sort {
        let left = a.get(key).unwrap_or(&Bson::Null);
        let right = b.get(key).unwrap_or(&Bson::Null);
        let ordering = compare_bson(left, right);
        let ordering = if is_descending(direction) {
            ordering.reverse()
        } else {
            ordering
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

fn is_descending(direction: &Bson) -> bool {
    match direction {
        Bson::Int32(v) => *v < 0,
        Bson::Int64(v) => *v < 0,
        Bson::Double(v) => *v < 0.0,
        _ => false,
    }
}

/// Position of a type in MongoDB's comparison order.
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn compare_bson(left: &Bson, right: &Bson) -> Ordering {
    if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
        return l.partial_cmp(&r).unwrap_or(Ordering::Equal);
    }

    match (left, right) {
        (Bson::String(l), Bson::String(r)) => l.cmp(r),
        (Bson::ObjectId(l), Bson::ObjectId(r)) => l.bytes().cmp(&r.bytes()),
        (Bson::Boolean(l), Bson::Boolean(r)) => l.cmp(r),
        (Bson::DateTime(l), Bson::DateTime(r)) => l.timestamp_millis().cmp(&r.timestamp_millis()),
        (Bson::Timestamp(l), Bson::Timestamp(r)) => (l.time, l.increment).cmp(&(r.time, r.increment)),
        (Bson::Binary(l), Bson::Binary(r)) => l.bytes.cmp(&r.bytes),
        (Bson::Document(l), Bson::Document(r)) => {
            for ((lk, lv), (rk, rv)) in l.iter().zip(r.iter()) {
                let ordering = lk.cmp(rk).then_with(|| compare_bson(lv, rv));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            l.len().cmp(&r.len())
        },
        (Bson::Array(l), Bson::Array(r)) => {
            for (lv, rv) in l.iter().zip(r) {
                let ordering = compare_bson(lv, rv);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            l.len().cmp(&r.len())
        },
        _ if type_rank(left) == type_rank(right) && left == right => Ordering::Equal,
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

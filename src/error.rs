//! Error types returned by step operations.
//!
//! Every manager operation returns [`StepError`]. The step handlers turn an error
//! into a failed step using its `Display` text, so the messages here are what a
//! scenario author sees in the cucumber report.

use std::{fmt, path::PathBuf, time::Duration};

use thiserror::Error;

/// Errors surfaced by a step operation.
#[derive(Debug, Error)]
pub enum StepError {
    /// A step referenced a database alias that was never registered.
    #[error("mongo database {0:?} is not registered to the manager")]
    UnregisteredDatabase(String),

    /// A document payload, filter or fixture could not be decoded.
    #[error("failed to parse {subject}: {source}")]
    Parse {
        /// What was being parsed (`documents`, `filter`, `expected documents`).
        subject: &'static str,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Assertion(#[from] AssertionError),

    /// A fixture file was missing or unreadable.
    #[error("could not read file {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A regex capture could not be converted to the handler's argument type.
    #[error("invalid step argument: {0}")]
    InvalidArgument(String),
}

impl StepError {
    pub(crate) fn parse(subject: &'static str) -> impl FnOnce(ParseError) -> Self {
        move |source| Self::Parse { subject, source }
    }
}

/// Errors raised while decoding extended JSON.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no document payload was provided")]
    Missing,

    #[error("error unmarshaling extjson: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error unmarshaling extjson: {0}")]
    ExtJson(#[from] bson::extjson::de::Error),

    #[error("error unmarshaling extjson: expected {expected}, found {found}")]
    Shape { expected: &'static str, found: &'static str },
}

/// A failed database call, tagged with the operation and collection.
#[derive(Debug, Error)]
#[error("could not {operation} collection {collection:?}: {source}")]
pub struct DatabaseError {
    pub operation: Operation,
    pub collection: String,
    #[source]
    pub source: StoreError,
}

impl DatabaseError {
    pub fn new(operation: Operation, collection: &str, source: impl Into<StoreError>) -> Self {
        Self {
            operation,
            collection: collection.to_string(),
            source: source.into(),
        }
    }
}

/// The database operation a [`DatabaseError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Find,
    Read,
    Insert,
    Count,
    Truncate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            Self::Find => "find documents in",
            Self::Read => "read documents from",
            Self::Insert => "insert documents into",
            Self::Count => "count documents in",
            Self::Truncate => "truncate",
        };
        f.write_str(phrase)
    }
}

/// Errors produced by a [`DocumentStore`](crate::store::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    /// The in-memory store refused the request.
    #[error("{0}")]
    Rejected(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Assertion failures reported by the `Then` steps.
#[derive(Debug, Error)]
pub enum AssertionError {
    #[error("collection {collection:?} has {actual} document(s), expected none")]
    NotEmpty { collection: String, actual: u64 },

    #[error("collection {collection:?} has {actual} document(s), expected {expected}")]
    CountMismatch {
        collection: String,
        actual: u64,
        expected: u64,
    },

    #[error("no documents are available in the search result, did you forget to search?")]
    NoSearchResult,

    #[error("there are {actual} documents in the search result, expected {expected}")]
    ResultCountMismatch { actual: usize, expected: usize },

    #[error("not equal:\n{diff}")]
    NotEqual { diff: String },

    #[error("could not decode {side} JSON: {source}")]
    InvalidJson {
        side: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// Convenience alias
pub type StepResult<T> = Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_error_names_operation_and_collection() {
        let err = DatabaseError::new(Operation::Insert, "customer", StoreError::Rejected("command failed".into()));

        assert_eq!(
            err.to_string(),
            r#"could not insert documents into collection "customer": command failed"#
        );
    }

    #[test]
    fn parse_error_carries_subject() {
        let err = StepError::parse("filter")(ParseError::Missing);

        assert_eq!(err.to_string(), "failed to parse filter: no document payload was provided");
    }

    #[test]
    fn timeout_is_reported_with_duration() {
        let err = DatabaseError::new(Operation::Count, "customer", StoreError::Timeout(Duration::from_millis(5)));

        assert_eq!(
            err.to_string(),
            r#"could not count documents in collection "customer": operation timed out after 5ms"#
        );
    }
}

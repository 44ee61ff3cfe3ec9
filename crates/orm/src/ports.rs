// Port traits define the full driver contract - not every method is used by
// every repository.
#![allow(dead_code)]

//! Port traits for the database driver boundary.
//!
//! The repository layer never talks to ArangoDB directly; it consumes this
//! capability surface, which a driver adapter implements over the store's
//! HTTP protocol. Keeping the boundary as a trait lets tests run against a
//! mock and keeps connection management, authentication and transport out of
//! this crate entirely.

use async_trait::async_trait;
use serde_json::Value;

use crate::aql::AqlQuery;

/// ArangoDB error number for "document not found".
pub const ERROR_DOCUMENT_NOT_FOUND: i64 = 1202;

/// Errors surfaced by the driver adapter.
///
/// Failures propagate to repository callers unmodified; this layer performs
/// no retries and no translation beyond the graceful not-found paths.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The server rejected the operation with an ArangoDB error number.
    #[error("arango error {code}: {message}")]
    Arango { code: i64, message: String },

    /// The request never produced a server response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl DriverError {
    pub fn arango(code: i64, message: impl Into<String>) -> Self {
        Self::Arango {
            code,
            message: message.into(),
        }
    }

    /// True when the error is the store's "document not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Arango { code, .. } if *code == ERROR_DOCUMENT_NOT_FOUND)
    }
}

/// Identifier of a server-side stream transaction.
///
/// Obtained by the caller from the driver when it begins a transaction; the
/// repository only threads it through to the driver so every sub-operation
/// of a call runs as a step of the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flags for write operations, mirroring the store's returnNew/returnOld.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub return_new: bool,
    pub return_old: bool,
}

impl WriteOptions {
    pub fn returning_new() -> Self {
        Self {
            return_new: true,
            return_old: false,
        }
    }

    pub fn returning_old() -> Self {
        Self {
            return_new: false,
            return_old: true,
        }
    }
}

/// Options for AQL query execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Request the full (unpaginated) match count alongside the results.
    pub full_count: bool,
}

/// Traversal direction for edge reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Any,
    In,
    Out,
}

/// A cursor over AQL query results.
///
/// Cursor batches are fetched lazily; when the query ran inside a
/// transaction the driver keeps the drain on the same transaction.
#[async_trait]
pub trait AqlCursor: Send {
    /// Next result row, or `None` when the cursor is exhausted.
    async fn next(&mut self) -> Result<Option<Value>, DriverError>;

    /// Drain all remaining rows.
    async fn all(&mut self) -> Result<Vec<Value>, DriverError>;

    /// Full match count when the query was executed with
    /// [`QueryOptions::full_count`], independent of any LIMIT clause.
    fn full_count(&self) -> Option<u64>;
}

/// Capability surface of the database driver.
///
/// Batch write methods return one JSON value per input item, positionally:
/// either a success (`_key`/`_id`/`_rev` plus `new`/`old` per
/// [`WriteOptions`]) or the store's structural failure shape
/// (`{"error": true, "errorNum": …, "errorMessage": …}`). The repository is
/// responsible for classifying them; the driver must not throw away per-item
/// failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArangoConnection: Send + Sync {
    /// Fetch a single document by key or id. Graceful: a missing document is
    /// `Ok(None)`, never an error.
    async fn document(
        &self,
        collection: &str,
        selector: &str,
        txn: Option<TransactionId>,
    ) -> Result<Option<Value>, DriverError>;

    /// Fetch several documents by key or id; per-item failures are returned
    /// in place.
    async fn documents(
        &self,
        collection: &str,
        selectors: &[String],
        txn: Option<TransactionId>,
    ) -> Result<Vec<Value>, DriverError>;

    /// Existence probe for one document.
    async fn document_exists(
        &self,
        collection: &str,
        selector: &str,
        txn: Option<TransactionId>,
    ) -> Result<bool, DriverError>;

    /// Insert documents.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Value>,
        options: WriteOptions,
        txn: Option<TransactionId>,
    ) -> Result<Vec<Value>, DriverError>;

    /// Partially update documents selected by their `_key`/`_id` fields
    /// (merge semantics).
    async fn update_many(
        &self,
        collection: &str,
        documents: Vec<Value>,
        options: WriteOptions,
        txn: Option<TransactionId>,
    ) -> Result<Vec<Value>, DriverError>;

    /// Replace documents whole (fields absent from the input are cleared).
    async fn replace_many(
        &self,
        collection: &str,
        documents: Vec<Value>,
        options: WriteOptions,
        txn: Option<TransactionId>,
    ) -> Result<Vec<Value>, DriverError>;

    /// Remove documents by key or id.
    async fn remove_many(
        &self,
        collection: &str,
        selectors: Vec<String>,
        options: WriteOptions,
        txn: Option<TransactionId>,
    ) -> Result<Vec<Value>, DriverError>;

    /// Empty the collection. Irreversible.
    async fn truncate(
        &self,
        collection: &str,
        txn: Option<TransactionId>,
    ) -> Result<(), DriverError>;

    /// Execute an AQL query and return a cursor over its results.
    async fn query(
        &self,
        query: AqlQuery,
        options: QueryOptions,
        txn: Option<TransactionId>,
    ) -> Result<Box<dyn AqlCursor>, DriverError>;

    /// Edges of an edge collection incident to `vertex`.
    async fn edges(
        &self,
        collection: &str,
        vertex: &str,
        direction: EdgeDirection,
        txn: Option<TransactionId>,
    ) -> Result<Vec<Value>, DriverError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test doubles shared by the repository test modules.

    use super::*;
    use std::collections::VecDeque;

    /// Cursor backed by a pre-seeded row list.
    pub(crate) struct VecCursor {
        rows: VecDeque<Value>,
        full_count: Option<u64>,
    }

    impl VecCursor {
        pub(crate) fn new(rows: Vec<Value>) -> Self {
            Self {
                rows: rows.into(),
                full_count: None,
            }
        }

        pub(crate) fn with_full_count(rows: Vec<Value>, full_count: u64) -> Self {
            Self {
                rows: rows.into(),
                full_count: Some(full_count),
            }
        }
    }

    #[async_trait]
    impl AqlCursor for VecCursor {
        async fn next(&mut self) -> Result<Option<Value>, DriverError> {
            Ok(self.rows.pop_front())
        }

        async fn all(&mut self) -> Result<Vec<Value>, DriverError> {
            Ok(self.rows.drain(..).collect())
        }

        fn full_count(&self) -> Option<u64> {
            self.full_count
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_predicate_matches_1202_only() {
        assert!(DriverError::arango(ERROR_DOCUMENT_NOT_FOUND, "not found").is_not_found());
        assert!(!DriverError::arango(1210, "unique constraint violated").is_not_found());
        assert!(!DriverError::Transport("timeout".into()).is_not_found());
    }
}

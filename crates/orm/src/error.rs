//! Repository error type.

use crate::ports::DriverError;
use crate::results::DocumentOperationFailure;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors surfaced by repository operations.
///
/// Driver failures propagate unmodified; the only translations this layer
/// performs are the graceful not-found paths (which return `None` instead)
/// and the per-item failure classification of batch results.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Failure from the underlying driver (network, constraint violation,
    /// malformed query, …).
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A single-document write was rejected by the store.
    #[error("document operation failed: {0}")]
    Operation(DocumentOperationFailure),

    /// No collection metadata was registered for the entity type. This is a
    /// bootstrap configuration error, not a runtime condition to recover
    /// from.
    #[error("no metadata registered for entity type `{0}`")]
    MissingMetadata(String),

    /// Removal by criteria was called with zero filter fields; refused
    /// before any I/O to prevent an accidental unfiltered mass deletion.
    #[error("remove_by requires at least one filter field")]
    EmptyFilter,

    /// An atomic upsert statement unexpectedly produced no row.
    #[error("upsert returned no result for collection `{0}`")]
    UpsertReturnedNothing(String),

    /// A document could not be (de)serialized into the entity type.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An event listener reported a failure; aborts the surrounding
    /// operation at the point of dispatch.
    #[error("event listener failed: {0}")]
    Listener(String),
}

impl RepositoryError {
    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener(message.into())
    }
}

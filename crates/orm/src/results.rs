//! Result shapes returned by repository operations.

use serde::{Deserialize, Serialize};

use crate::entity::Document;

/// Paginated query result.
///
/// `total_count` reflects the full matching set size independent of the
/// requested page and page size.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultList<T> {
    pub total_count: u64,
    pub results: Vec<Document<T>>,
}

/// The store's structural failure shape for one item of a batch operation.
///
/// Never raised for batch calls; it occupies the failing item's position in
/// the result sequence so callers can inspect or filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentOperationFailure {
    pub error: bool,
    #[serde(rename = "errorNum")]
    pub error_num: i64,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

impl std::fmt::Display for DocumentOperationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error {}: {}", self.error_num, self.error_message)
    }
}

/// One positional outcome of a batch operation: a document result or the
/// store's failure shape.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult<R> {
    Document(R),
    Failure(DocumentOperationFailure),
}

impl<R> BatchResult<R> {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn document(&self) -> Option<&R> {
        match self {
            Self::Document(doc) => Some(doc),
            Self::Failure(_) => None,
        }
    }

    pub fn into_document(self) -> Option<R> {
        match self {
            Self::Document(doc) => Some(doc),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&DocumentOperationFailure> {
        match self {
            Self::Document(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// New and old state of a mutated document.
///
/// `old` is absent when the operation had nothing to replace (the insert
/// branch of an upsert) or when `return_old` was disabled.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPair<T> {
    pub new: Option<Document<T>>,
    pub old: Option<Document<T>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_shape_matches_the_wire_format() {
        let failure: DocumentOperationFailure = serde_json::from_value(json!({
            "error": true,
            "errorNum": 1210,
            "errorMessage": "unique constraint violated",
        }))
        .expect("valid failure");

        assert_eq!(failure.error_num, 1210);
        assert!(BatchResult::<()>::Failure(failure).is_failure());
    }
}

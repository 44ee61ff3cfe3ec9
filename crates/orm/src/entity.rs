//! Entity traits and the stored-document shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A user-defined record type stored in a document collection.
///
/// Implementors are plain serde types; the repository owns no entity
/// instances and moves plain data in and out of the store. `entity_name`
/// is the key used to look up collection and listener metadata registered
/// at bootstrap (see [`crate::metadata`]).
pub trait ArangoEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Declared name of the entity type, stable across the process.
    fn entity_name() -> &'static str;
}

/// Marker for edge entities.
///
/// Edge types carry `_from`/`_to` themselves (serde renames), required at
/// creation and immutable thereafter; the store enforces the latter.
pub trait ArangoEdgeEntity: ArangoEntity {}

/// Identity fields assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Unique within the collection; generated by the store when omitted
    /// at save time.
    #[serde(rename = "_key")]
    pub key: String,
    /// `{collection}/{key}`.
    #[serde(rename = "_id")]
    pub id: String,
    /// Opaque revision token.
    #[serde(rename = "_rev")]
    pub rev: String,
}

/// A persisted document: store identity plus the entity body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    #[serde(flatten)]
    pub meta: DocumentMetadata,
    #[serde(flatten)]
    pub document: T,
}

impl<T> Document<T> {
    pub fn key(&self) -> &str {
        &self.meta.key
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }
}

/// A persisted edge document: endpoints plus store identity and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<T> {
    /// Id of the source vertex document.
    #[serde(rename = "_from")]
    pub from: String,
    /// Id of the target vertex document.
    #[serde(rename = "_to")]
    pub to: String,
    #[serde(flatten)]
    pub meta: DocumentMetadata,
    #[serde(flatten)]
    pub document: T,
}

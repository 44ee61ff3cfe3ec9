//! Repository layer over an ArangoDB-style document and graph store.
//!
//! The crate maps between plain entity types and stored documents, builds
//! dynamic AQL with bound parameters, dispatches entity lifecycle events
//! around every mutation, and threads caller-supplied stream transactions
//! through each operation. It never talks to the server itself: a driver
//! adapter implements the [`ports::ArangoConnection`] capability surface
//! and everything above it stays transport-agnostic.
//!
//! Typical setup registers entity metadata and listeners once at process
//! start, then constructs one [`Repository`] per entity type:
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde::{Deserialize, Serialize};
//! use arango_orm::{register_entity, ArangoEntity, Repository};
//! # use arango_orm::ports::ArangoConnection;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Person {
//!     name: String,
//! }
//!
//! impl ArangoEntity for Person {
//!     fn entity_name() -> &'static str {
//!         "Person"
//!     }
//! }
//!
//! # fn connect() -> Arc<dyn ArangoConnection> { unimplemented!() }
//! # fn main() -> Result<(), arango_orm::RepositoryError> {
//! register_entity::<Person>("People");
//! let people: Repository<Person> = Repository::new(connect())?;
//! # Ok(())
//! # }
//! ```

pub mod aql;
pub mod edge;
pub mod entity;
pub mod error;
pub mod events;
pub mod metadata;
pub mod options;
pub mod ports;
pub mod repository;
pub mod results;
pub mod transaction;

pub use aql::{AqlFragment, AqlQuery, AqlValue, Criteria, SortDirection};
pub use edge::EdgeRepository;
pub use entity::{ArangoEdgeEntity, ArangoEntity, Document, DocumentMetadata, Edge};
pub use error::{RepositoryError, RepositoryResult};
pub use events::{EventContext, EventInfo, EventKind, EventListener, RawRepository};
pub use metadata::{
    register_entity, register_listener, EventListenerStorage, TypeMetadata, TypeMetadataStorage,
};
pub use options::{
    CountOptions, EdgesOptions, ExistsOptions, FindAllOptions, FindManyByOptions, FindManyOptions,
    FindOneByOptions, FindOneOptions, RemoveOptions, ReplaceOptions, SaveOptions, TruncateOptions,
    UpdateOptions, UpsertOptions,
};
pub use ports::{
    AqlCursor, ArangoConnection, DriverError, EdgeDirection, QueryOptions, TransactionId,
    WriteOptions, ERROR_DOCUMENT_NOT_FOUND,
};
pub use repository::Repository;
pub use results::{BatchResult, DocumentOperationFailure, DocumentPair, ResultList};
pub use transaction::Transaction;

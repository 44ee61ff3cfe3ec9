//! Lifecycle events: kinds, listener signature, dispatch context.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::RepositoryResult;
use crate::options::{RemoveOptions, SaveOptions, UpdateOptions};
use crate::ports::ArangoConnection;
use crate::transaction::Transaction;

/// The lifecycle points an entity type can hook into.
///
/// Removal operations have no before-hook: removal events fire only once
/// the removal is confirmed. Upsert has no after-kind of its own; after the
/// atomic statement runs, `AfterUpdate` or `AfterSave` fires depending on
/// whether an old value existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BeforeSave,
    AfterSave,
    BeforeUpdate,
    AfterUpdate,
    BeforeReplace,
    AfterReplace,
    BeforeUpsert,
    AfterRemove,
}

/// Position of the current item within a batch operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventInfo {
    /// Zero-based index of the item the dispatch refers to; stays `0` for
    /// single-document operations.
    pub current: usize,
}

/// Context handed to every listener invocation.
///
/// Created per operation (per batch for the bulk variants) and mutated in
/// place as the operation progresses: `info.current` advances, `new`/`old`
/// are populated once results are known. Before-listeners may mutate `new`;
/// the mutated value is what the operation writes.
pub struct EventContext {
    /// Document state the event refers to. For before-events this is the
    /// outgoing value; for after-events the persisted one.
    pub new: Option<Value>,
    /// Pre-mutation state, when the operation produced one.
    pub old: Option<Value>,
    pub info: EventInfo,
    /// Opaque value supplied by the caller through the operation's options.
    pub data: Option<Value>,
    /// Connection the operation is running against.
    pub database: Arc<dyn ArangoConnection>,
    /// Transaction the operation is scoped to, if any.
    pub transaction: Option<Transaction>,
    /// The issuing repository, for re-entrant calls.
    ///
    /// A listener that calls back into the repository must pass
    /// `emit_events: false`, otherwise the sub-call dispatches the same
    /// event again and recursion never terminates. This is the entity
    /// author's responsibility; the core does not enforce it.
    pub repository: Arc<dyn RawRepository>,
}

/// An entity lifecycle callback.
///
/// Listeners run sequentially and are awaited; a slow listener delays the
/// operation that dispatched it. An error aborts the surrounding operation.
pub type EventListener =
    Arc<dyn for<'a> Fn(&'a mut EventContext) -> BoxFuture<'a, RepositoryResult<()>> + Send + Sync>;

/// Untyped persistence surface exposed to listeners through
/// [`EventContext::repository`].
///
/// Operates on plain JSON documents so the trait stays object-safe across
/// entity types; documents carry `_key`/`_id` inline where a selector is
/// required.
#[async_trait]
pub trait RawRepository: Send + Sync {
    fn collection_name(&self) -> &str;

    /// Insert one document, returning its persisted state.
    async fn save_raw(
        &self,
        document: Value,
        options: SaveOptions,
    ) -> RepositoryResult<Option<Value>>;

    /// Partially update one document identified by its `_key`/`_id` field,
    /// returning `(new, old)`.
    async fn update_raw(
        &self,
        document: Value,
        options: UpdateOptions,
    ) -> RepositoryResult<(Option<Value>, Option<Value>)>;

    /// Remove one document, returning its pre-removal state.
    async fn remove_raw(
        &self,
        selector: &str,
        options: RemoveOptions,
    ) -> RepositoryResult<Option<Value>>;
}

//! The generic repository: typed CRUD/query operations over one collection.
//!
//! One repository instance per entity type. Each operation optionally emits
//! a "before" event, builds any dynamic AQL fragment it needs, executes
//! through the transaction wrapper, emits "after" events per result item,
//! and classifies per-item outcomes for the batch variants.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::aql::{AqlFragment, AqlValue, Criteria};
use crate::entity::{ArangoEntity, Document};
use crate::error::{RepositoryError, RepositoryResult};
use crate::events::{EventContext, EventInfo, EventKind, EventListener, RawRepository};
use crate::metadata::{EventListenerStorage, TypeMetadata, TypeMetadataStorage};
use crate::options::{
    CountOptions, ExistsOptions, FindAllOptions, FindManyByOptions, FindManyOptions,
    FindOneByOptions, FindOneOptions, RemoveOptions, ReplaceOptions, SaveOptions,
    TruncateOptions, UpdateOptions, UpsertOptions,
};
use crate::ports::{
    ArangoConnection, DriverError, QueryOptions, WriteOptions, ERROR_DOCUMENT_NOT_FOUND,
};
use crate::results::{BatchResult, DocumentOperationFailure, DocumentPair, ResultList};
use crate::transaction::{run_scoped, Transaction};

/// Untyped state and operations shared by [`Repository`] and the listener
/// re-entrancy surface.
///
/// All persistence logic lives here at the JSON level; the typed repository
/// wrappers (de)serialize entities on the way in and out.
pub(crate) struct RepositoryCore {
    database: Arc<dyn ArangoConnection>,
    metadata: TypeMetadata,
    listeners: Option<HashMap<EventKind, EventListener>>,
}

impl RepositoryCore {
    fn collection(&self) -> &str {
        &self.metadata.collection
    }

    fn has_listener(&self, kind: EventKind) -> bool {
        self.listeners
            .as_ref()
            .is_some_and(|listeners| listeners.contains_key(&kind))
    }

    async fn emit(&self, kind: EventKind, context: &mut EventContext) -> RepositoryResult<()> {
        if let Some(listener) = self
            .listeners
            .as_ref()
            .and_then(|listeners| listeners.get(&kind))
        {
            listener(context).await?;
        }
        Ok(())
    }

    fn new_context(
        core: &Arc<Self>,
        transaction: Option<Transaction>,
        data: Option<Value>,
    ) -> EventContext {
        EventContext {
            new: None,
            old: None,
            info: EventInfo::default(),
            data,
            database: core.database.clone(),
            transaction,
            repository: Arc::new(Arc::clone(core)),
        }
    }

    /// Dispatch a before-event for each document in order, letting the
    /// listener mutate the outgoing value in place. One context serves the
    /// whole batch; `info.current` advances per item.
    async fn emit_before(
        core: &Arc<Self>,
        kind: EventKind,
        documents: &mut [Value],
        transaction: &Option<Transaction>,
        data: &Option<Value>,
    ) -> RepositoryResult<()> {
        if !core.has_listener(kind) {
            return Ok(());
        }
        let mut context = Self::new_context(core, transaction.clone(), data.clone());
        for (index, document) in documents.iter_mut().enumerate() {
            context.info.current = index;
            context.new = Some(std::mem::take(document));
            let outcome = core.emit(kind, &mut context).await;
            if let Some(value) = context.new.take() {
                *document = value;
            }
            outcome?;
        }
        Ok(())
    }

    async fn emit_after(
        &self,
        kind: EventKind,
        context: &mut EventContext,
        index: usize,
        new: Option<&Value>,
        old: Option<&Value>,
    ) -> RepositoryResult<()> {
        context.info.current = index;
        context.new = new.cloned();
        context.old = old.cloned();
        self.emit(kind, context).await
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    async fn find_one_value(
        core: &Arc<Self>,
        selector: &str,
        options: &FindOneOptions,
    ) -> RepositoryResult<Option<Value>> {
        let value = run_scoped(options.transaction.as_ref(), |txn| async move {
            core.database
                .document(core.collection(), selector, txn)
                .await
        })
        .await?;
        Ok(value)
    }

    async fn find_one_by_value(
        core: &Arc<Self>,
        criteria: &Criteria,
        options: &FindOneByOptions,
    ) -> RepositoryResult<Option<Value>> {
        let collection = core.collection();
        let mut fragment = AqlFragment::new();
        fragment
            .raw(format!("WITH {collection} FOR d IN {collection} "))
            .filter(criteria)
            .raw("RETURN d");
        let query = fragment.into_query();

        let row = run_scoped(options.transaction.as_ref(), |txn| async move {
            let mut cursor = core
                .database
                .query(query, QueryOptions::default(), txn)
                .await?;
            cursor.next().await
        })
        .await?;
        Ok(row)
    }

    async fn find_many_values(
        core: &Arc<Self>,
        selectors: &[String],
        options: &FindManyOptions,
    ) -> RepositoryResult<Vec<Value>> {
        let items = run_scoped(options.transaction.as_ref(), |txn| async move {
            core.database
                .documents(core.collection(), selectors, txn)
                .await
        })
        .await?;

        // A missing document is a normal miss and silently dropped; any
        // other per-item failure surfaces to the caller.
        let mut documents = Vec::with_capacity(items.len());
        for item in items {
            match classify(item) {
                BatchResult::Document(value) => documents.push(value),
                BatchResult::Failure(failure)
                    if failure.error_num == ERROR_DOCUMENT_NOT_FOUND => {}
                BatchResult::Failure(failure) => {
                    return Err(RepositoryError::Operation(failure));
                }
            }
        }
        Ok(documents)
    }

    async fn find_many_by_values(
        core: &Arc<Self>,
        criteria: &Criteria,
        options: &FindManyByOptions,
    ) -> RepositoryResult<(Vec<Value>, u64)> {
        let collection = core.collection();
        let mut fragment = AqlFragment::new();
        fragment
            .raw(format!("WITH {collection} FOR d IN {collection} "))
            .filter(criteria)
            .sort(&options.sort);
        if options.page.is_some() || options.page_size.is_some() {
            fragment.limit(options.page.unwrap_or(0), options.page_size.unwrap_or(10));
        }
        fragment.raw("RETURN d");
        let query = fragment.into_query();

        let (rows, full_count) = run_scoped(options.transaction.as_ref(), |txn| async move {
            let mut cursor = core
                .database
                .query(query, QueryOptions { full_count: true }, txn)
                .await?;
            let rows = cursor.all().await?;
            let full_count = cursor.full_count();
            Ok::<_, DriverError>((rows, full_count))
        })
        .await?;

        let total_count = full_count.unwrap_or(rows.len() as u64);
        Ok((rows, total_count))
    }

    async fn count_by(
        core: &Arc<Self>,
        criteria: &Criteria,
        options: &CountOptions,
    ) -> RepositoryResult<u64> {
        let collection = core.collection();
        let mut fragment = AqlFragment::new();
        fragment
            .raw(format!("WITH {collection} FOR d IN {collection} "))
            .filter(criteria)
            .raw("COLLECT WITH COUNT INTO length RETURN length");
        let query = fragment.into_query();

        let row = run_scoped(options.transaction.as_ref(), |txn| async move {
            let mut cursor = core
                .database
                .query(query, QueryOptions::default(), txn)
                .await?;
            cursor.next().await
        })
        .await?;
        Ok(row.and_then(|value| value.as_u64()).unwrap_or(0))
    }

    async fn exists(
        core: &Arc<Self>,
        selector: &str,
        options: &ExistsOptions,
    ) -> RepositoryResult<bool> {
        let found = run_scoped(options.transaction.as_ref(), |txn| async move {
            core.database
                .document_exists(core.collection(), selector, txn)
                .await
        })
        .await?;
        Ok(found)
    }

    async fn exist(
        core: &Arc<Self>,
        selectors: &[String],
        options: &ExistsOptions,
    ) -> RepositoryResult<Vec<bool>> {
        // Probes run inside one scope so a supplied transaction covers all
        // of them; output order mirrors input order.
        let found = run_scoped(options.transaction.as_ref(), |txn| async move {
            let mut found = Vec::with_capacity(selectors.len());
            for selector in selectors {
                found.push(
                    core.database
                        .document_exists(core.collection(), selector, txn.clone())
                        .await?,
                );
            }
            Ok::<_, DriverError>(found)
        })
        .await?;
        Ok(found)
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    async fn save_value(
        core: &Arc<Self>,
        document: Value,
        options: &SaveOptions,
    ) -> RepositoryResult<Option<Value>> {
        let mut documents = [document];
        if options.emit_events {
            Self::emit_before(
                core,
                EventKind::BeforeSave,
                &mut documents,
                &options.transaction,
                &options.data,
            )
            .await?;
        }
        let [document] = documents;

        let items = run_scoped(options.transaction.as_ref(), |txn| async move {
            core.database
                .insert_many(
                    core.collection(),
                    vec![document],
                    WriteOptions::returning_new(),
                    txn,
                )
                .await
        })
        .await?;

        let new = match items.into_iter().next().map(classify) {
            None => None,
            Some(BatchResult::Failure(failure)) => {
                return Err(RepositoryError::Operation(failure))
            }
            Some(BatchResult::Document(item)) => take_field(item, "new"),
        };
        tracing::debug!(collection = core.collection(), "saved document");

        if options.emit_events && core.has_listener(EventKind::AfterSave) {
            let mut context =
                Self::new_context(core, options.transaction.clone(), options.data.clone());
            core.emit_after(EventKind::AfterSave, &mut context, 0, new.as_ref(), None)
                .await?;
        }
        Ok(new)
    }

    async fn save_all_values(
        core: &Arc<Self>,
        mut documents: Vec<Value>,
        options: &SaveOptions,
    ) -> RepositoryResult<Vec<BatchResult<Option<Value>>>> {
        if options.emit_events {
            Self::emit_before(
                core,
                EventKind::BeforeSave,
                &mut documents,
                &options.transaction,
                &options.data,
            )
            .await?;
        }

        let items = run_scoped(options.transaction.as_ref(), |txn| async move {
            core.database
                .insert_many(
                    core.collection(),
                    documents,
                    WriteOptions::returning_new(),
                    txn,
                )
                .await
        })
        .await?;

        let results: Vec<BatchResult<Option<Value>>> = items
            .into_iter()
            .map(|item| classify(item).map_document(|value| take_field(value, "new")))
            .collect();

        if options.emit_events && core.has_listener(EventKind::AfterSave) {
            let mut context =
                Self::new_context(core, options.transaction.clone(), options.data.clone());
            for (index, result) in results.iter().enumerate() {
                if let BatchResult::Document(new) = result {
                    core.emit_after(
                        EventKind::AfterSave,
                        &mut context,
                        index,
                        new.as_ref(),
                        None,
                    )
                    .await?;
                }
            }
        }
        Ok(keep_failures(results, options.return_failures))
    }

    async fn update_value(
        core: &Arc<Self>,
        document: Value,
        options: &UpdateOptions,
    ) -> RepositoryResult<(Option<Value>, Option<Value>)> {
        let mut documents = [document];
        if options.emit_events {
            Self::emit_before(
                core,
                EventKind::BeforeUpdate,
                &mut documents,
                &options.transaction,
                &options.data,
            )
            .await?;
        }
        let [document] = documents;

        let write = WriteOptions {
            return_new: true,
            return_old: options.return_old,
        };
        let items = run_scoped(options.transaction.as_ref(), |txn| async move {
            core.database
                .update_many(core.collection(), vec![document], write, txn)
                .await
        })
        .await?;

        let (new, old) = match items.into_iter().next().map(classify) {
            None => (None, None),
            Some(BatchResult::Failure(failure)) => {
                return Err(RepositoryError::Operation(failure))
            }
            Some(BatchResult::Document(item)) => take_pair(item),
        };

        if options.emit_events && core.has_listener(EventKind::AfterUpdate) {
            let mut context =
                Self::new_context(core, options.transaction.clone(), options.data.clone());
            core.emit_after(
                EventKind::AfterUpdate,
                &mut context,
                0,
                new.as_ref(),
                old.as_ref(),
            )
            .await?;
        }
        Ok((new, old))
    }

    async fn update_all_values(
        core: &Arc<Self>,
        mut documents: Vec<Value>,
        options: &UpdateOptions,
    ) -> RepositoryResult<Vec<BatchResult<(Option<Value>, Option<Value>)>>> {
        Self::mutate_all_values(core, &mut documents, options, Mutation::Update).await
    }

    async fn replace_value(
        core: &Arc<Self>,
        selector: &str,
        document: Value,
        options: &ReplaceOptions,
    ) -> RepositoryResult<(Option<Value>, Option<Value>)> {
        let mut documents = [with_selector(document, selector)];
        if options.emit_events {
            Self::emit_before(
                core,
                EventKind::BeforeReplace,
                &mut documents,
                &options.transaction,
                &options.data,
            )
            .await?;
        }
        let [document] = documents;

        let write = WriteOptions {
            return_new: true,
            return_old: options.return_old,
        };
        let items = run_scoped(options.transaction.as_ref(), |txn| async move {
            core.database
                .replace_many(core.collection(), vec![document], write, txn)
                .await
        })
        .await?;

        let (new, old) = match items.into_iter().next().map(classify) {
            None => (None, None),
            Some(BatchResult::Failure(failure)) => {
                return Err(RepositoryError::Operation(failure))
            }
            Some(BatchResult::Document(item)) => take_pair(item),
        };

        if options.emit_events && core.has_listener(EventKind::AfterReplace) {
            let mut context =
                Self::new_context(core, options.transaction.clone(), options.data.clone());
            core.emit_after(
                EventKind::AfterReplace,
                &mut context,
                0,
                new.as_ref(),
                old.as_ref(),
            )
            .await?;
        }
        Ok((new, old))
    }

    async fn replace_all_values(
        core: &Arc<Self>,
        mut documents: Vec<Value>,
        options: &ReplaceOptions,
    ) -> RepositoryResult<Vec<BatchResult<(Option<Value>, Option<Value>)>>> {
        Self::mutate_all_values(core, &mut documents, options, Mutation::Replace).await
    }

    /// Shared batch body for update-all and replace-all: the two differ only
    /// in event kinds and the driver primitive.
    async fn mutate_all_values(
        core: &Arc<Self>,
        documents: &mut Vec<Value>,
        options: &UpdateOptions,
        mutation: Mutation,
    ) -> RepositoryResult<Vec<BatchResult<(Option<Value>, Option<Value>)>>> {
        if options.emit_events {
            Self::emit_before(
                core,
                mutation.before(),
                documents,
                &options.transaction,
                &options.data,
            )
            .await?;
        }

        let write = WriteOptions {
            return_new: true,
            return_old: options.return_old,
        };
        let batch = std::mem::take(documents);
        let items = run_scoped(options.transaction.as_ref(), |txn| async move {
            match mutation {
                Mutation::Update => {
                    core.database
                        .update_many(core.collection(), batch, write, txn)
                        .await
                }
                Mutation::Replace => {
                    core.database
                        .replace_many(core.collection(), batch, write, txn)
                        .await
                }
            }
        })
        .await?;

        let results: Vec<BatchResult<(Option<Value>, Option<Value>)>> = items
            .into_iter()
            .map(|item| classify(item).map_document(take_pair))
            .collect();

        if options.emit_events && core.has_listener(mutation.after()) {
            let mut context =
                Self::new_context(core, options.transaction.clone(), options.data.clone());
            for (index, result) in results.iter().enumerate() {
                if let BatchResult::Document((new, old)) = result {
                    core.emit_after(
                        mutation.after(),
                        &mut context,
                        index,
                        new.as_ref(),
                        old.as_ref(),
                    )
                    .await?;
                }
            }
        }
        Ok(keep_failures(results, options.return_failures))
    }

    async fn upsert_value(
        core: &Arc<Self>,
        match_document: Value,
        insert_document: Value,
        update_document: AqlValue,
        options: &UpsertOptions,
    ) -> RepositoryResult<(Option<Value>, Option<Value>)> {
        let mut inserts = [insert_document];
        let mut update_document = update_document;
        if options.emit_events {
            // The winning branch is only known after the atomic statement
            // runs, so every before-hook fires up front.
            Self::emit_before(
                core,
                EventKind::BeforeUpsert,
                &mut inserts,
                &options.transaction,
                &options.data,
            )
            .await?;
            Self::emit_before(
                core,
                EventKind::BeforeSave,
                &mut inserts,
                &options.transaction,
                &options.data,
            )
            .await?;
            match update_document.to_plain() {
                Some(plain) => {
                    let mut updates = [plain];
                    Self::emit_before(
                        core,
                        EventKind::BeforeUpdate,
                        &mut updates,
                        &options.transaction,
                        &options.data,
                    )
                    .await?;
                    let [plain] = updates;
                    update_document = AqlValue::from(plain);
                }
                // Server-side expressions have no plain form to hand the
                // listener; dispatch with an empty document state.
                None => {
                    if core.has_listener(EventKind::BeforeUpdate) {
                        let mut context = Self::new_context(
                            core,
                            options.transaction.clone(),
                            options.data.clone(),
                        );
                        core.emit(EventKind::BeforeUpdate, &mut context).await?;
                    }
                }
            }
        }
        let [insert_document] = inserts;

        let collection = core.collection();
        let mut fragment = AqlFragment::new();
        fragment.raw(format!("WITH {collection} UPSERT "));
        fragment.document(&AqlValue::from(match_document));
        fragment.raw(" INSERT ");
        fragment.document(&AqlValue::from(insert_document));
        fragment.raw(" UPDATE ");
        fragment.document(&update_document);
        fragment.raw(format!(" IN {collection} RETURN {{ new: NEW, old: OLD }}"));
        let query = fragment.into_query();

        let row = run_scoped(options.transaction.as_ref(), |txn| async move {
            let mut cursor = core
                .database
                .query(query, QueryOptions::default(), txn)
                .await?;
            cursor.next().await
        })
        .await?;

        let row = row.ok_or_else(|| {
            RepositoryError::UpsertReturnedNothing(core.collection().to_string())
        })?;
        let (new, old) = take_pair(row);

        if options.emit_events {
            // Post-hoc branch selection: an existing old value means the
            // update branch ran, otherwise the insert branch did.
            let kind = if old.is_some() {
                EventKind::AfterUpdate
            } else {
                EventKind::AfterSave
            };
            if core.has_listener(kind) {
                let mut context =
                    Self::new_context(core, options.transaction.clone(), options.data.clone());
                core.emit_after(kind, &mut context, 0, new.as_ref(), old.as_ref())
                    .await?;
            }
        }
        Ok((new, old))
    }

    async fn remove_value(
        core: &Arc<Self>,
        selector: &str,
        options: &RemoveOptions,
    ) -> RepositoryResult<Option<Value>> {
        let items = run_scoped(options.transaction.as_ref(), |txn| async move {
            core.database
                .remove_many(
                    core.collection(),
                    vec![selector.to_string()],
                    WriteOptions::returning_old(),
                    txn,
                )
                .await
        })
        .await?;

        let old = match items.into_iter().next().map(classify) {
            None => None,
            Some(BatchResult::Failure(failure)) => {
                return Err(RepositoryError::Operation(failure))
            }
            Some(BatchResult::Document(item)) => take_field(item, "old"),
        };
        tracing::debug!(collection = core.collection(), "removed document");

        if options.emit_events && core.has_listener(EventKind::AfterRemove) {
            let mut context =
                Self::new_context(core, options.transaction.clone(), options.data.clone());
            core.emit_after(EventKind::AfterRemove, &mut context, 0, None, old.as_ref())
                .await?;
        }
        Ok(old)
    }

    async fn remove_by_values(
        core: &Arc<Self>,
        criteria: &Criteria,
        options: &RemoveOptions,
    ) -> RepositoryResult<Vec<Value>> {
        // Refuse to become an unfiltered mass deletion.
        if criteria.is_empty() {
            return Err(RepositoryError::EmptyFilter);
        }

        let collection = core.collection();
        let mut fragment = AqlFragment::new();
        fragment
            .raw(format!("WITH {collection} FOR d IN {collection} "))
            .filter(criteria)
            .raw(format!("REMOVE d IN {collection} RETURN OLD"));
        let query = fragment.into_query();

        let removed = run_scoped(options.transaction.as_ref(), |txn| async move {
            let mut cursor = core
                .database
                .query(query, QueryOptions::default(), txn)
                .await?;
            cursor.all().await
        })
        .await?;
        tracing::debug!(
            collection = core.collection(),
            count = removed.len(),
            "removed documents by criteria"
        );

        if options.emit_events && core.has_listener(EventKind::AfterRemove) {
            let mut context =
                Self::new_context(core, options.transaction.clone(), options.data.clone());
            for (index, old) in removed.iter().enumerate() {
                core.emit_after(EventKind::AfterRemove, &mut context, index, None, Some(old))
                    .await?;
            }
        }
        Ok(removed)
    }

    async fn remove_all_values(
        core: &Arc<Self>,
        selectors: Vec<String>,
        options: &RemoveOptions,
    ) -> RepositoryResult<Vec<BatchResult<Option<Value>>>> {
        let items = run_scoped(options.transaction.as_ref(), |txn| async move {
            core.database
                .remove_many(
                    core.collection(),
                    selectors,
                    WriteOptions::returning_old(),
                    txn,
                )
                .await
        })
        .await?;

        let results: Vec<BatchResult<Option<Value>>> = items
            .into_iter()
            .map(|item| classify(item).map_document(|value| take_field(value, "old")))
            .collect();

        if options.emit_events && core.has_listener(EventKind::AfterRemove) {
            let mut context =
                Self::new_context(core, options.transaction.clone(), options.data.clone());
            for (index, result) in results.iter().enumerate() {
                if let BatchResult::Document(old) = result {
                    core.emit_after(
                        EventKind::AfterRemove,
                        &mut context,
                        index,
                        None,
                        old.as_ref(),
                    )
                    .await?;
                }
            }
        }
        Ok(keep_failures(results, options.return_failures))
    }

    async fn truncate(core: &Arc<Self>, options: &TruncateOptions) -> RepositoryResult<()> {
        run_scoped(options.transaction.as_ref(), |txn| async move {
            core.database.truncate(core.collection(), txn).await
        })
        .await?;
        tracing::debug!(collection = core.collection(), "truncated collection");
        Ok(())
    }
}

/// Distinguishes the two merge-vs-overwrite batch mutations sharing one
/// implementation.
#[derive(Clone, Copy)]
enum Mutation {
    Update,
    Replace,
}

impl Mutation {
    fn before(self) -> EventKind {
        match self {
            Self::Update => EventKind::BeforeUpdate,
            Self::Replace => EventKind::BeforeReplace,
        }
    }

    fn after(self) -> EventKind {
        match self {
            Self::Update => EventKind::AfterUpdate,
            Self::Replace => EventKind::AfterReplace,
        }
    }
}

#[async_trait]
impl RawRepository for Arc<RepositoryCore> {
    fn collection_name(&self) -> &str {
        self.collection()
    }

    async fn save_raw(
        &self,
        document: Value,
        options: SaveOptions,
    ) -> RepositoryResult<Option<Value>> {
        RepositoryCore::save_value(self, document, &options).await
    }

    async fn update_raw(
        &self,
        document: Value,
        options: UpdateOptions,
    ) -> RepositoryResult<(Option<Value>, Option<Value>)> {
        RepositoryCore::update_value(self, document, &options).await
    }

    async fn remove_raw(
        &self,
        selector: &str,
        options: RemoveOptions,
    ) -> RepositoryResult<Option<Value>> {
        RepositoryCore::remove_value(self, selector, &options).await
    }
}

/// Classify one positional result of a batch write: the store's failure
/// shape carries `error`/`errorNum`/`errorMessage` and no identity fields.
/// `errorNum` arrives as a number or, from some server versions, a numeric
/// string; both count.
fn classify(item: Value) -> BatchResult<Value> {
    let has_identity = item.get("_key").is_some() || item.get("_id").is_some();
    if !has_identity && item.get("error").and_then(Value::as_bool) == Some(true) {
        let error_num = item.get("errorNum").and_then(error_number);
        let message = item.get("errorMessage").and_then(Value::as_str);
        if let (Some(error_num), Some(message)) = (error_num, message) {
            return BatchResult::Failure(DocumentOperationFailure {
                error: true,
                error_num,
                error_message: message.to_string(),
            });
        }
    }
    BatchResult::Document(item)
}

fn error_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

impl<R> BatchResult<R> {
    fn map_document<S>(self, f: impl FnOnce(R) -> S) -> BatchResult<S> {
        match self {
            Self::Document(value) => BatchResult::Document(f(value)),
            Self::Failure(failure) => BatchResult::Failure(failure),
        }
    }
}

fn take_field(mut item: Value, field: &str) -> Option<Value> {
    match item.get_mut(field).map(Value::take) {
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    }
}

fn take_pair(mut item: Value) -> (Option<Value>, Option<Value>) {
    let new = item.get_mut("new").map(Value::take);
    let old = item.get_mut("old").map(Value::take);
    let non_null = |value: Option<Value>| match value {
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    };
    (non_null(new), non_null(old))
}

fn keep_failures<R>(results: Vec<BatchResult<R>>, return_failures: bool) -> Vec<BatchResult<R>> {
    if return_failures {
        results
    } else {
        results
            .into_iter()
            .filter(|result| !result.is_failure())
            .collect()
    }
}

fn with_selector(mut document: Value, selector: &str) -> Value {
    let field = if selector.contains('/') { "_id" } else { "_key" };
    if let Value::Object(entries) = &mut document {
        entries.insert(field.to_string(), json!(selector));
    }
    document
}

/// Typed repository over one entity type's collection.
///
/// Construction resolves collection and listener metadata registered at
/// bootstrap; an unregistered entity type is a configuration error and
/// fails loudly. The repository owns no entity instances: plain data goes
/// in and comes out, and listeners observe JSON document states.
pub struct Repository<T: ArangoEntity> {
    core: Arc<RepositoryCore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: ArangoEntity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            _entity: PhantomData,
        }
    }
}

impl<T: ArangoEntity> Repository<T> {
    pub fn new(database: Arc<dyn ArangoConnection>) -> RepositoryResult<Self> {
        let metadata = TypeMetadataStorage::get(T::entity_name())
            .ok_or_else(|| RepositoryError::MissingMetadata(T::entity_name().to_string()))?;
        let listeners = EventListenerStorage::get(T::entity_name());
        Ok(Self {
            core: Arc::new(RepositoryCore {
                database,
                metadata,
                listeners,
            }),
            _entity: PhantomData,
        })
    }

    pub(crate) fn database(&self) -> &Arc<dyn ArangoConnection> {
        &self.core.database
    }

    pub fn collection_name(&self) -> &str {
        self.core.collection()
    }

    /// Compose `{collection}/{key}`. Pure string composition, no I/O.
    pub fn id_for(&self, key: &str) -> String {
        format!("{}/{}", self.collection_name(), key)
    }

    /// Decompose an id into its key part. Malformed input without a `/`
    /// separator passes through unchanged.
    pub fn key_from<'a>(&self, id: &'a str) -> &'a str {
        id.split_once('/').map_or(id, |(_, key)| key)
    }

    /// Rehydrate a plain data object into the entity type.
    pub fn create(&self, document: Value) -> RepositoryResult<T> {
        Ok(serde_json::from_value(document)?)
    }

    pub async fn document_exists(
        &self,
        selector: &str,
        options: ExistsOptions,
    ) -> RepositoryResult<bool> {
        RepositoryCore::exists(&self.core, selector, &options).await
    }

    /// Batch existence probe; output order mirrors input order.
    pub async fn documents_exist(
        &self,
        selectors: &[String],
        options: ExistsOptions,
    ) -> RepositoryResult<Vec<bool>> {
        RepositoryCore::exist(&self.core, selectors, &options).await
    }

    /// Count of documents matching the criteria; zero matches is `0`,
    /// never an error.
    pub async fn get_document_count_by(
        &self,
        criteria: &Criteria,
        options: CountOptions,
    ) -> RepositoryResult<u64> {
        RepositoryCore::count_by(&self.core, criteria, &options).await
    }

    /// Fetch one document by key or id. A miss is `Ok(None)`.
    pub async fn find_one(
        &self,
        selector: &str,
        options: FindOneOptions,
    ) -> RepositoryResult<Option<Document<T>>> {
        let value = RepositoryCore::find_one_value(&self.core, selector, &options).await?;
        value.map(deserialize_document).transpose()
    }

    /// First document matching the criteria, or `None`. No ordering
    /// guarantee unless the criteria disambiguate.
    pub async fn find_one_by(
        &self,
        criteria: &Criteria,
        options: FindOneByOptions,
    ) -> RepositoryResult<Option<Document<T>>> {
        let value = RepositoryCore::find_one_by_value(&self.core, criteria, &options).await?;
        value.map(deserialize_document).transpose()
    }

    /// Batch lookup by keys or ids. Missing documents are silently dropped;
    /// any other per-item failure fails the call.
    pub async fn find_many(
        &self,
        selectors: &[String],
        options: FindManyOptions,
    ) -> RepositoryResult<Vec<Document<T>>> {
        let values = RepositoryCore::find_many_values(&self.core, selectors, &options).await?;
        values.into_iter().map(deserialize_document).collect()
    }

    /// Filtered read with optional pagination and multi-field sort.
    /// `total_count` reflects the full match count regardless of paging.
    pub async fn find_many_by(
        &self,
        criteria: &Criteria,
        options: FindManyByOptions,
    ) -> RepositoryResult<ResultList<T>> {
        let (values, total_count) =
            RepositoryCore::find_many_by_values(&self.core, criteria, &options).await?;
        let results = values
            .into_iter()
            .map(deserialize_document)
            .collect::<RepositoryResult<_>>()?;
        Ok(ResultList {
            total_count,
            results,
        })
    }

    /// Unfiltered read with optional pagination and sort.
    pub async fn find_all(&self, options: FindAllOptions) -> RepositoryResult<ResultList<T>> {
        self.find_many_by(&Criteria::new(), options).await
    }

    /// Insert one entity. Emits `BeforeSave` before the insert and
    /// `AfterSave` after, the latter carrying the persisted state
    /// (including any server-assigned key).
    pub async fn save(&self, document: &T, options: SaveOptions) -> RepositoryResult<Option<Document<T>>> {
        let value = serde_json::to_value(document)?;
        let new = RepositoryCore::save_value(&self.core, value, &options).await?;
        new.map(deserialize_document).transpose()
    }

    /// Batch insert. `BeforeSave` fires once per item before the batched
    /// write, `AfterSave` once per successful item after it; failures keep
    /// their position unless `return_failures` is disabled. A successful
    /// entry is `None` only when the store returned no document state for
    /// it.
    pub async fn save_all(
        &self,
        documents: &[T],
        options: SaveOptions,
    ) -> RepositoryResult<Vec<BatchResult<Option<Document<T>>>>> {
        let values = documents
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let results = RepositoryCore::save_all_values(&self.core, values, &options).await?;
        deserialize_batch(results, |new| new.map(deserialize_document).transpose())
    }

    /// Partial (merge) update of one document identified by the `_key` or
    /// `_id` field of `document`. Returns `(new, old)`; `old` honors
    /// `return_old`. Emits `BeforeUpdate`/`AfterUpdate`.
    pub async fn update(
        &self,
        document: Value,
        options: UpdateOptions,
    ) -> RepositoryResult<DocumentPair<T>> {
        let (new, old) = RepositoryCore::update_value(&self.core, document, &options).await?;
        deserialize_pair(new, old)
    }

    /// Batch partial update; same per-item failure classification as
    /// [`Repository::save_all`].
    pub async fn update_all(
        &self,
        documents: Vec<Value>,
        options: UpdateOptions,
    ) -> RepositoryResult<Vec<BatchResult<DocumentPair<T>>>> {
        let results = RepositoryCore::update_all_values(&self.core, documents, &options).await?;
        deserialize_batch(results, |(new, old)| deserialize_pair(new, old))
    }

    /// Whole-document replace: fields absent from `document` are cleared,
    /// unlike update's merge semantics. Emits `BeforeReplace`/`AfterReplace`.
    pub async fn replace(
        &self,
        selector: &str,
        document: &T,
        options: ReplaceOptions,
    ) -> RepositoryResult<DocumentPair<T>> {
        let value = serde_json::to_value(document)?;
        let (new, old) =
            RepositoryCore::replace_value(&self.core, selector, value, &options).await?;
        deserialize_pair(new, old)
    }

    /// Batch replace; documents carry their own `_key`/`_id`.
    pub async fn replace_all(
        &self,
        documents: Vec<Value>,
        options: ReplaceOptions,
    ) -> RepositoryResult<Vec<BatchResult<DocumentPair<T>>>> {
        let results = RepositoryCore::replace_all_values(&self.core, documents, &options).await?;
        deserialize_batch(results, |(new, old)| deserialize_pair(new, old))
    }

    /// Atomic "update if matched, else insert", executed as one server-side
    /// statement to avoid a read-then-write race.
    ///
    /// `BeforeUpsert` and `BeforeSave` fire against the insert document and
    /// `BeforeUpdate` against the update document before the statement runs
    /// (the winning branch is unknown until it has). Afterwards exactly one
    /// of `AfterUpdate` (old value existed) or `AfterSave` (fresh insert)
    /// fires. The update document may mix plain values with
    /// [`AqlValue::Literal`] server-side expressions.
    pub async fn upsert(
        &self,
        match_criteria: &Criteria,
        insert_document: Value,
        update_document: impl Into<AqlValue>,
        options: UpsertOptions,
    ) -> RepositoryResult<DocumentPair<T>> {
        let (new, old) = RepositoryCore::upsert_value(
            &self.core,
            Value::Object(match_criteria.clone()),
            insert_document,
            update_document.into(),
            &options,
        )
        .await?;
        deserialize_pair(new, old)
    }

    /// Remove one document and return its pre-removal state.
    ///
    /// Removal emits `AfterRemove` only. There is deliberately no
    /// before-remove hook; removal events fire once the removal is
    /// confirmed.
    pub async fn remove(
        &self,
        selector: &str,
        options: RemoveOptions,
    ) -> RepositoryResult<Option<Document<T>>> {
        let old = RepositoryCore::remove_value(&self.core, selector, &options).await?;
        old.map(deserialize_document).transpose()
    }

    /// Remove every document matching the criteria, returning the removed
    /// states. Fails fast with [`RepositoryError::EmptyFilter`] on empty
    /// criteria, before any I/O. Emits `AfterRemove` per removed item; like
    /// all removal operations it has no before-hook.
    pub async fn remove_by(
        &self,
        criteria: &Criteria,
        options: RemoveOptions,
    ) -> RepositoryResult<Vec<Document<T>>> {
        let values = RepositoryCore::remove_by_values(&self.core, criteria, &options).await?;
        values.into_iter().map(deserialize_document).collect()
    }

    /// Batch remove by explicit selector list; same per-item failure
    /// classification as the other batch operations.
    pub async fn remove_all(
        &self,
        selectors: Vec<String>,
        options: RemoveOptions,
    ) -> RepositoryResult<Vec<BatchResult<Option<Document<T>>>>> {
        let results = RepositoryCore::remove_all_values(&self.core, selectors, &options).await?;
        deserialize_batch(results, |old| old.map(deserialize_document).transpose())
    }

    /// Empty the collection. No events, irreversible.
    pub async fn truncate(&self, options: TruncateOptions) -> RepositoryResult<()> {
        RepositoryCore::truncate(&self.core, &options).await
    }
}

fn deserialize_document<T: ArangoEntity>(value: Value) -> RepositoryResult<Document<T>> {
    Ok(serde_json::from_value(value)?)
}

fn deserialize_pair<T: ArangoEntity>(
    new: Option<Value>,
    old: Option<Value>,
) -> RepositoryResult<DocumentPair<T>> {
    Ok(DocumentPair {
        new: new.map(deserialize_document).transpose()?,
        old: old.map(deserialize_document).transpose()?,
    })
}

/// Convert every item of a batch in place: positions are preserved, so a
/// batch of k inputs always yields k results (fewer only when
/// `return_failures` filtered at the untyped layer).
fn deserialize_batch<R, S>(
    results: Vec<BatchResult<R>>,
    f: impl Fn(R) -> RepositoryResult<S>,
) -> RepositoryResult<Vec<BatchResult<S>>> {
    results
        .into_iter()
        .map(|result| match result {
            BatchResult::Failure(failure) => Ok(BatchResult::Failure(failure)),
            BatchResult::Document(value) => Ok(BatchResult::Document(f(value)?)),
        })
        .collect()
}

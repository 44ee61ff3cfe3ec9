//! Process-wide metadata registries.
//!
//! Entity types are registered once at application bootstrap, decoupled from
//! repository construction, so both stores are process-wide singletons: a
//! single globally-addressable instance behind a lazy presence check.
//! Re-registration for the same key is idempotent in the "last write wins"
//! sense and never an error.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use once_cell::sync::Lazy;

use crate::entity::ArangoEntity;
use crate::error::RepositoryResult;
use crate::events::{EventContext, EventKind, EventListener};

/// Per-entity-type record mapping the declared type name to its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMetadata {
    /// Collection the entity type persists into.
    pub collection: String,
    /// Declared entity type name, the registry key.
    pub entity: String,
}

static TYPE_METADATA: Lazy<DashMap<String, TypeMetadata>> = Lazy::new(DashMap::new);

static EVENT_LISTENERS: Lazy<DashMap<String, HashMap<EventKind, EventListener>>> =
    Lazy::new(DashMap::new);

/// Registry of entity type → collection metadata.
pub struct TypeMetadataStorage;

impl TypeMetadataStorage {
    /// Insert or overwrite the record for `metadata.entity`.
    pub fn register(metadata: TypeMetadata) {
        TYPE_METADATA.insert(metadata.entity.clone(), metadata);
    }

    /// Look up the record for an entity type name.
    ///
    /// `None` means the type was never registered; constructing a
    /// repository for it is a bootstrap configuration error.
    pub fn get(entity: &str) -> Option<TypeMetadata> {
        TYPE_METADATA.get(entity).map(|entry| entry.clone())
    }
}

/// Registry of entity type → lifecycle listeners.
///
/// Exactly one listener per (type, event kind) pair: registering a second
/// listener of the same kind overwrites the first.
pub struct EventListenerStorage;

impl EventListenerStorage {
    pub fn register(entity: &str, kind: EventKind, listener: EventListener) {
        EVENT_LISTENERS
            .entry(entity.to_string())
            .or_default()
            .insert(kind, listener);
    }

    /// Snapshot of the listener map for an entity type, if any were
    /// registered. Listeners are shared handles, so cloning the map is
    /// cheap.
    pub fn get(entity: &str) -> Option<HashMap<EventKind, EventListener>> {
        EVENT_LISTENERS.get(entity).map(|entry| entry.clone())
    }
}

/// Register the collection an entity type persists into.
///
/// The explicit bootstrap counterpart of a class-level collection
/// annotation: call once per entity type at process start.
pub fn register_entity<T: ArangoEntity>(collection: impl Into<String>) {
    TypeMetadataStorage::register(TypeMetadata {
        collection: collection.into(),
        entity: T::entity_name().to_string(),
    });
}

/// Register a lifecycle listener for an entity type.
///
/// The listener is awaited at the corresponding point of every repository
/// operation on `T` that has events enabled. Listeners may call back into
/// the repository through [`EventContext::repository`]; such re-entrant
/// calls must disable event emission or dispatch recurses without bound.
pub fn register_listener<T, F>(kind: EventKind, listener: F)
where
    T: ArangoEntity,
    F: for<'a> Fn(&'a mut EventContext) -> BoxFuture<'a, RepositoryResult<()>>
        + Send
        + Sync
        + 'static,
{
    EventListenerStorage::register(T::entity_name(), kind, Arc::new(listener));
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Widget;

    impl ArangoEntity for Widget {
        fn entity_name() -> &'static str {
            "MetadataTestWidget"
        }
    }

    #[test]
    fn last_registration_wins_for_a_type_name() {
        register_entity::<Widget>("Widgets");
        register_entity::<Widget>("WidgetsV2");

        let metadata = TypeMetadataStorage::get(Widget::entity_name()).expect("registered");
        assert_eq!(metadata.collection, "WidgetsV2");
    }

    #[test]
    fn unregistered_type_has_no_metadata() {
        assert!(TypeMetadataStorage::get("NeverRegistered").is_none());
        assert!(EventListenerStorage::get("NeverRegistered").is_none());
    }

    #[test]
    fn one_listener_per_kind_with_overwrite() {
        let entity = "MetadataTestOverwrite";
        let make =
            || -> EventListener { Arc::new(|_ctx: &mut EventContext| async { Ok(()) }.boxed()) };

        EventListenerStorage::register(entity, EventKind::BeforeSave, make());
        EventListenerStorage::register(entity, EventKind::BeforeSave, make());
        EventListenerStorage::register(entity, EventKind::AfterSave, make());

        let listeners = EventListenerStorage::get(entity).expect("registered");
        assert_eq!(listeners.len(), 2);
        assert!(listeners.contains_key(&EventKind::BeforeSave));
        assert!(listeners.contains_key(&EventKind::AfterSave));
    }
}

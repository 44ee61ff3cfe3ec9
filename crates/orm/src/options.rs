//! Per-operation option structs.
//!
//! Every operation accepts an optional transaction handle. Mutating
//! operations additionally default to emitting lifecycle events and carry an
//! optional opaque `data` value surfaced to listeners through the event
//! context. `return_failures` applies to batch variants only: when disabled
//! the result sequence keeps successes and drops failure-shaped items.

use serde_json::Value;

use crate::aql::SortDirection;
use crate::transaction::Transaction;

#[derive(Debug, Clone, Default)]
pub struct FindOneOptions {
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, Default)]
pub struct FindOneByOptions {
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, Default)]
pub struct FindManyOptions {
    pub transaction: Option<Transaction>,
}

/// Pagination and sorting for filtered multi-document reads.
///
/// `page` is zero-based; `page * page_size` is the result offset. With both
/// `page` and `page_size` unset the read is unpaginated.
#[derive(Debug, Clone, Default)]
pub struct FindManyByOptions {
    pub transaction: Option<Transaction>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Sort fields apply in the order given, direction per field.
    pub sort: Vec<(String, SortDirection)>,
}

pub type FindAllOptions = FindManyByOptions;

#[derive(Debug, Clone, Default)]
pub struct CountOptions {
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, Default)]
pub struct ExistsOptions {
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub transaction: Option<Transaction>,
    pub emit_events: bool,
    /// Opaque caller context surfaced to listeners as `EventContext::data`.
    pub data: Option<Value>,
    /// Batch variant only.
    pub return_failures: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            transaction: None,
            emit_events: true,
            data: None,
            return_failures: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub transaction: Option<Transaction>,
    pub emit_events: bool,
    pub data: Option<Value>,
    /// Return the pre-mutation state alongside the new one.
    pub return_old: bool,
    /// Batch variant only.
    pub return_failures: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            transaction: None,
            emit_events: true,
            data: None,
            return_old: true,
            return_failures: true,
        }
    }
}

pub type ReplaceOptions = UpdateOptions;

#[derive(Debug, Clone)]
pub struct UpsertOptions {
    pub transaction: Option<Transaction>,
    pub emit_events: bool,
    pub data: Option<Value>,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            transaction: None,
            emit_events: true,
            data: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoveOptions {
    pub transaction: Option<Transaction>,
    pub emit_events: bool,
    pub data: Option<Value>,
    /// Batch variant only.
    pub return_failures: bool,
}

impl Default for RemoveOptions {
    fn default() -> Self {
        Self {
            transaction: None,
            emit_events: true,
            data: None,
            return_failures: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TruncateOptions {
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, Default)]
pub struct EdgesOptions {
    pub transaction: Option<Transaction>,
}

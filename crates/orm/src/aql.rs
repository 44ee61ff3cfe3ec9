//! Dynamic AQL construction.
//!
//! Queries are assembled from raw text and bound parameters; user data is
//! never interpolated into the query string. The only escape hatch is
//! [`AqlValue::Literal`], an explicitly tagged raw fragment for server-side
//! expressions (`DATE_NOW()`, `OLD.counter + 1`, …) that the caller opts
//! into per value.

use serde_json::{Map, Value};

/// Flat field → value mapping used to build equality filters.
///
/// Key order is preserved (serde_json's `preserve_order` feature), so the
/// generated predicates appear in input order.
pub type Criteria = Map<String, Value>;

/// Sort direction for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_aql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// An assembled AQL statement with its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AqlQuery {
    pub query: String,
    pub bind_vars: Map<String, Value>,
}

/// A document-shaped value for dynamic update/upsert statements.
///
/// `Value` leaves are passed as bound parameters; `Literal` leaves are
/// spliced into the query text unescaped. Containers recurse, preserving
/// key order, so one document can mix plain data and computed server-side
/// expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum AqlValue {
    /// Ordinary data, bound as a parameter.
    Value(Value),
    /// Raw AQL expression, spliced without escaping.
    Literal(String),
    /// Array literal.
    List(Vec<AqlValue>),
    /// Object literal; entries render in the order given.
    Object(Vec<(String, AqlValue)>),
}

impl AqlValue {
    /// Raw expression constructor.
    pub fn literal(expression: impl Into<String>) -> Self {
        Self::Literal(expression.into())
    }

    /// Plain JSON rendering of this value, or `None` if any leaf is a
    /// [`AqlValue::Literal`] server-side expression.
    pub fn to_plain(&self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value.clone()),
            Self::Literal(_) => None,
            Self::List(items) => items
                .iter()
                .map(Self::to_plain)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Self::Object(entries) => entries
                .iter()
                .map(|(key, item)| item.to_plain().map(|value| (key.clone(), value)))
                .collect::<Option<Map<_, _>>>()
                .map(Value::Object),
        }
    }
}

impl From<Value> for AqlValue {
    /// Decomposes containers so every scalar becomes its own bound
    /// parameter, matching how a hand-built [`AqlValue`] renders.
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
            other => Self::Value(other),
        }
    }
}

/// Incremental AQL builder combining raw text, named binds and
/// auto-numbered binds.
#[derive(Debug, Default)]
pub struct AqlFragment {
    text: String,
    bind_vars: Map<String, Value>,
    next_param: usize,
}

impl AqlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw query text. Must never carry user data.
    pub fn raw(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.text.push_str(text.as_ref());
        self
    }

    /// Append a named bound parameter reference (`@name`).
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        let name = name.into();
        self.text.push('@');
        self.text.push_str(&name);
        self.bind_vars.insert(name, value);
        self
    }

    /// Append an auto-named bound parameter (`@p0`, `@p1`, …).
    pub fn value(&mut self, value: Value) -> &mut Self {
        let name = format!("p{}", self.next_param);
        self.next_param += 1;
        self.bind(name, value)
    }

    /// Append one `FILTER d.field == @field` predicate per criteria entry,
    /// in input key order, every value bound.
    ///
    /// Empty criteria append nothing, which matches all documents; callers
    /// that must not run unfiltered (removal by criteria) guard before
    /// building.
    pub fn filter(&mut self, criteria: &Criteria) -> &mut Self {
        for (field, value) in criteria {
            self.raw(format!("FILTER d.{field} == "));
            self.bind(field.clone(), value.clone());
            self.raw(" ");
        }
        self
    }

    /// Append a `SORT` clause; fields apply in the order given with
    /// per-field direction. Empty input appends nothing.
    pub fn sort(&mut self, sort: &[(String, SortDirection)]) -> &mut Self {
        if sort.is_empty() {
            return self;
        }
        let fields = sort
            .iter()
            .map(|(field, direction)| format!("d.{field} {}", direction.as_aql()))
            .collect::<Vec<_>>()
            .join(", ");
        self.raw(format!("SORT {fields} "))
    }

    /// Append a `LIMIT offset, count` clause; `page` is zero-based.
    pub fn limit(&mut self, page: u32, page_size: u32) -> &mut Self {
        self.raw(format!("LIMIT {}, {} ", page as u64 * page_size as u64, page_size))
    }

    /// Render a document literal, binding `Value` leaves and splicing
    /// `Literal` leaves raw.
    pub fn document(&mut self, value: &AqlValue) -> &mut Self {
        match value {
            AqlValue::Value(v) => {
                self.value(v.clone());
            }
            AqlValue::Literal(expression) => {
                self.raw(expression);
            }
            AqlValue::List(items) => {
                self.raw("[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.raw(",");
                    }
                    self.document(item);
                }
                self.raw("]");
            }
            AqlValue::Object(entries) => {
                self.raw("{");
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.raw(",");
                    }
                    self.raw(format!("{}:", Value::String(key.clone())));
                    self.document(item);
                }
                self.raw("}");
            }
        }
        self
    }

    pub fn into_query(self) -> AqlQuery {
        AqlQuery {
            query: self.text.trim_end().to_string(),
            bind_vars: self.bind_vars,
        }
    }
}

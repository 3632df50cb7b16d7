//! Document-store port shared by the control-plane repositories.
//!
//! The service persists every entity (events, viewers, payments, playback
//! sessions, admins) in keyed document tables with optional sort keys and
//! named secondary indexes. This crate defines the store contract —
//! conditional puts, attribute mutations with atomic counter adds, index
//! queries and cursor-opaque pagination — plus an in-memory engine used by
//! tests and local wiring.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

pub use memory::MemoryStore;

/// A stored document. Attribute order is not significant; keys are attribute
/// names, values are JSON.
pub type Document = serde_json::Map<String, Value>;

/// Primary key of a document: partition key plus optional sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub partition: String,
    pub sort: Option<String>,
}

impl Key {
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }
}

/// Schema for a secondary index over a table.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub name: &'static str,
    pub partition_attr: &'static str,
    pub sort_attr: Option<&'static str>,
}

/// Schema for a table: key attribute names plus secondary indexes.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub partition_attr: &'static str,
    pub sort_attr: Option<&'static str>,
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, partition_attr: &'static str) -> Self {
        Self {
            name: name.into(),
            partition_attr,
            sort_attr: None,
            indexes: Vec::new(),
        }
    }

    pub fn with_sort(mut self, sort_attr: &'static str) -> Self {
        self.sort_attr = Some(sort_attr);
        self
    }

    pub fn with_index(
        mut self,
        name: &'static str,
        partition_attr: &'static str,
        sort_attr: Option<&'static str>,
    ) -> Self {
        self.indexes.push(IndexSchema {
            name,
            partition_attr,
            sort_attr,
        });
        self
    }
}

/// Condition attached to a put.
#[derive(Debug, Clone)]
pub enum PutCondition {
    /// Unconditional write (upsert).
    None,
    /// Succeed only if no document exists under the same key.
    NotExists,
    /// Succeed only if the stored attribute currently equals the value.
    AttrEquals(&'static str, Value),
}

/// Condition attached to an update.
#[derive(Debug, Clone)]
pub enum UpdateCondition {
    /// Upsert: create the document if it does not exist.
    None,
    /// Fail with `ConditionFailed` if the document does not exist.
    Exists,
    /// Fail unless the stored attribute currently equals the value. Implies
    /// the document exists.
    AttrEquals(&'static str, Value),
    /// Fail unless the attribute is currently absent or equals the value.
    AttrAbsentOrEquals(&'static str, Value),
}

/// Single attribute mutation applied by `update`.
#[derive(Debug, Clone)]
pub enum Mutation {
    Set(&'static str, Value),
    Remove(&'static str),
    /// Atomic numeric add; treats a missing attribute as zero.
    Add(&'static str, f64),
}

/// Equality / substring filter applied after key conditions.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub equals: BTreeMap<&'static str, Value>,
    /// Case-insensitive substring match on a string attribute.
    pub contains: Option<(&'static str, String)>,
}

impl Filter {
    pub fn eq(mut self, attr: &'static str, value: Value) -> Self {
        self.equals.insert(attr, value);
        self
    }

    pub fn contains(mut self, attr: &'static str, needle: impl Into<String>) -> Self {
        self.contains = Some((attr, needle.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.contains.is_none()
    }

    fn matches(&self, doc: &Document) -> bool {
        for (attr, expected) in &self.equals {
            if doc.get(*attr) != Some(expected) {
                return false;
            }
        }
        if let Some((attr, needle)) = &self.contains {
            let haystack = match doc.get(*attr).and_then(Value::as_str) {
                Some(s) => s.to_lowercase(),
                None => return false,
            };
            if !haystack.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Key condition for a query: partition equality, optionally narrowed to one
/// sort-key value.
#[derive(Debug, Clone)]
pub struct KeyCondition {
    pub partition: Value,
    pub sort: Option<Value>,
}

impl KeyCondition {
    pub fn partition(value: impl Into<Value>) -> Self {
        Self {
            partition: value.into(),
            sort: None,
        }
    }

    pub fn with_sort(mut self, value: impl Into<Value>) -> Self {
        self.sort = Some(value.into());
        self
    }
}

/// Pagination and filtering options for query/scan.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filter: Option<Filter>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
    /// Iterate the sort dimension in descending order.
    pub descending: bool,
}

/// One page of results with an opaque continuation cursor.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Document>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conditional check failed")]
    ConditionFailed,
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown index {index} on table {table}")]
    UnknownIndex { table: String, index: String },
    #[error("document is missing key attribute {0}")]
    MissingKeyAttribute(&'static str),
    #[error("invalid pagination cursor")]
    BadCursor,
    #[error("attribute {0} is not numeric")]
    NotNumeric(String),
    #[error("store internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The persistence port. Every repository in the control plane talks to one
/// of these; all writes to a single document are serialized by the store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, table: &str, key: &Key) -> StoreResult<Option<Document>>;

    async fn put(&self, table: &str, doc: Document, condition: PutCondition) -> StoreResult<()>;

    /// Applies the mutations atomically and returns the resulting document.
    async fn update(
        &self,
        table: &str,
        key: &Key,
        mutations: Vec<Mutation>,
        condition: UpdateCondition,
    ) -> StoreResult<Document>;

    /// Queries the primary key space (`index == None`) or a named secondary
    /// index by partition equality.
    async fn query(
        &self,
        table: &str,
        index: Option<&str>,
        key_condition: KeyCondition,
        options: QueryOptions,
    ) -> StoreResult<Page>;

    async fn scan(&self, table: &str, options: QueryOptions) -> StoreResult<Page>;

    /// Deletes a document. Deleting a missing document is not an error.
    async fn delete(&self, table: &str, key: &Key) -> StoreResult<()>;
}

/// Extracts the primary key of a document under a schema.
pub fn document_key(schema: &TableSchema, doc: &Document) -> StoreResult<Key> {
    let partition = doc
        .get(schema.partition_attr)
        .and_then(Value::as_str)
        .ok_or(StoreError::MissingKeyAttribute(schema.partition_attr))?
        .to_string();
    let sort = match schema.sort_attr {
        Some(attr) => Some(
            doc.get(attr)
                .and_then(Value::as_str)
                .ok_or(StoreError::MissingKeyAttribute(attr))?
                .to_string(),
        ),
        None => None,
    };
    Ok(Key { partition, sort })
}

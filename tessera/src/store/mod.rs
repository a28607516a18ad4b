//! The document store boundary.
//!
//! The store persists loosely-typed documents, maintains indexes and runs
//! text and vector search. Tessera only talks to it through [`Store`]; the
//! [`MemoryStore`] here is an in-process implementation for tests and demos.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::query::{IndexRange, Order};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Document not found: {table}/{id}")]
    NotFound { table: String, id: String },

    #[error("Document rejected for table '{table}': {reason}")]
    Rejected { table: String, reason: String },

    #[error("Invalid resume position: {0}")]
    InvalidPosition(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Opaque resume point issued by the store for a document in a walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub Value);

/// A document as the store returns it: untyped fields plus system metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub table: String,
    pub created_at: DateTime<Utc>,
    pub fields: Map<String, Value>,
    pub position: Position,
}

/// Index traversal part of a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexScan {
    pub name: String,
    pub fields: Vec<String>,
    pub range: IndexRange,
}

/// A table scan or index traversal, in ascending or descending key order.
/// Without an index the key is insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub index: Option<IndexScan>,
    pub order: Order,
    pub start_after: Option<Position>,
}

/// A relevance-ranked full-text search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPlan {
    pub index: String,
    pub search_field: String,
    pub term: String,
    pub filters: Vec<(String, Value)>,
    pub start_after: Option<Position>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchRequest {
    pub index: String,
    pub vector_field: String,
    pub vector: Vec<f64>,
    pub limit: usize,
    pub filter: Option<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldPatch {
    Set(Value),
    Unset,
}

/// A partial update: fields to overwrite and fields to remove.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchDocument {
    pub fields: BTreeMap<String, FieldPatch>,
}

impl PatchDocument {
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), FieldPatch::Set(value.into()));
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldPatch::Unset);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Apply this patch to a document's fields.
    pub fn apply_to(&self, target: &mut Map<String, Value>) {
        for (field, patch) in &self.fields {
            match patch {
                FieldPatch::Set(value) => {
                    target.insert(field.clone(), value.clone());
                }
                FieldPatch::Unset => {
                    target.remove(field);
                }
            }
        }
    }
}

pub type DocumentStream<'a> = BoxStream<'a, StoreResult<StoredDocument>>;

/// Handle of an open mutation step, issued by [`Store::begin_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(pub u64);

/// Operations Tessera consumes from the document store.
///
/// Mutations run as steps: writes between [`begin_step`](Store::begin_step)
/// and [`rollback_step`](Store::rollback_step) are undone, and nothing is
/// observable of a rolled back step. Steps are not nested: the runtime opens
/// one at a time and a new step supersedes one left unfinished.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin_step(&self) -> StoreResult<StepId>;

    /// Keep the writes made since `step` began.
    async fn commit_step(&self, step: StepId) -> StoreResult<()>;

    /// Undo every write made since `step` began.
    async fn rollback_step(&self, step: StepId) -> StoreResult<()>;

    /// Insert a document and return the identifier the store issued.
    async fn insert(&self, table: &str, fields: Map<String, Value>) -> StoreResult<String>;

    /// Fetch a document. An id that does not resolve against `table`
    /// (never existed, deleted, or issued for another table) is `None`.
    async fn get(&self, table: &str, id: &str) -> StoreResult<Option<StoredDocument>>;

    async fn patch(&self, table: &str, id: &str, patch: PatchDocument) -> StoreResult<()>;

    async fn replace(&self, table: &str, id: &str, fields: Map<String, Value>) -> StoreResult<()>;

    async fn delete(&self, table: &str, id: &str) -> StoreResult<()>;

    /// Walk a table or index. Documents are produced in plan order, starting
    /// after `plan.start_after` when given.
    fn scan<'a>(&'a self, table: &'a str, plan: ScanPlan) -> DocumentStream<'a>;

    /// Relevance-ranked full-text search.
    fn search<'a>(&'a self, table: &'a str, plan: SearchPlan) -> DocumentStream<'a>;

    /// Nearest neighbours by ascending distance, at most `request.limit`.
    async fn vector_search(
        &self,
        table: &str,
        request: VectorSearchRequest,
    ) -> StoreResult<Vec<VectorMatch>>;

    /// Whether `raw` is a well-formed identifier issued for `table`.
    fn normalize_id(&self, table: &str, raw: &str) -> Option<String>;
}

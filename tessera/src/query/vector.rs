use serde_json::Value;
use std::marker::PhantomData;

use crate::id::{Id, Table};

pub const DEFAULT_VECTOR_LIMIT: usize = 10;

/// A similarity search over a vector index.
///
/// ```
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Serialize, Deserialize)]
/// # struct Note { text: String }
/// # impl tessera::Table for Note { const NAME: &'static str = "notes"; }
/// use tessera::VectorSearch;
///
/// let search = VectorSearch::<Note>::new("by_embedding", vec![1.0, 1.0, 1.0])
///     .limit(3)
///     .filter("tag", "x");
/// assert_eq!(search.limit_value(), 3);
/// ```
pub struct VectorSearch<T> {
    index: String,
    vector: Vec<f64>,
    limit: usize,
    filter: Option<(String, Value)>,
    _table: PhantomData<fn() -> T>,
}

impl<T: Table> VectorSearch<T> {
    pub fn new(index: impl Into<String>, vector: Vec<f64>) -> Self {
        VectorSearch {
            index: index.into(),
            vector,
            limit: DEFAULT_VECTOR_LIMIT,
            filter: None,
            _table: PhantomData,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Restrict candidates to documents whose filter field equals `value`.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some((field.into(), value.into()));
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn vector(&self) -> &[f64] {
        &self.vector
    }

    pub fn limit_value(&self) -> usize {
        self.limit
    }

    pub fn filter_value(&self) -> Option<&(String, Value)> {
        self.filter.as_ref()
    }
}

impl<T> Clone for VectorSearch<T> {
    fn clone(&self) -> Self {
        VectorSearch {
            index: self.index.clone(),
            vector: self.vector.clone(),
            limit: self.limit,
            filter: self.filter.clone(),
            _table: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for VectorSearch<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorSearch")
            .field("index", &self.index)
            .field("vector", &self.vector)
            .field("limit", &self.limit)
            .field("filter", &self.filter)
            .finish()
    }
}

/// A vector search hit; smaller distance is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorResult<T> {
    pub id: Id<T>,
    pub distance: f64,
}

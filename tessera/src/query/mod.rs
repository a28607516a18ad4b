//! Lazy query cursors.
//!
//! A cursor is a plan over one table: where rows come from (full scan, an
//! index range, or a search index), which post-filters apply, and in which
//! order. Building a cursor never touches the store; a terminal operator on
//! [`DatabaseReader`](crate::database::DatabaseReader) evaluates it.

mod filter;
mod range;
mod vector;

pub use filter::{field, literal, CompareOp, FilterExpr};
pub use range::{IndexRange, RangeBound, SearchFilter};
pub use vector::{VectorResult, VectorSearch, DEFAULT_VECTOR_LIMIT};

use serde::Serialize;
use std::marker::PhantomData;

use crate::id::Table;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// Where a cursor reads its documents from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySource {
    FullScan,
    Index { name: String, range: IndexRange },
    Search { index: String, filter: SearchFilter },
}

/// The untyped plan behind every cursor. Its JSON form identifies the
/// cursor's shape in pagination tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    table: &'static str,
    source: QuerySource,
    order: Order,
    filters: Vec<FilterExpr>,
}

impl QuerySpec {
    fn new(table: &'static str) -> Self {
        QuerySpec {
            table,
            source: QuerySource::FullScan,
            order: Order::Asc,
            filters: Vec::new(),
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn source(&self) -> &QuerySource {
        &self.source
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn filters(&self) -> &[FilterExpr] {
        &self.filters
    }
}

/// Anything a cardinality operator can evaluate.
pub trait Cursor: Send + Sync {
    type Doc: Table;

    fn spec(&self) -> &QuerySpec;
}

macro_rules! cursor_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<T> {
            spec: QuerySpec,
            _table: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            fn from_spec(spec: QuerySpec) -> Self {
                $name {
                    spec,
                    _table: PhantomData,
                }
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                $name::from_spec(self.spec.clone())
            }
        }

        impl<T> std::fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.spec).finish()
            }
        }

        impl<T: Table> Cursor for $name<T> {
            type Doc = T;

            fn spec(&self) -> &QuerySpec {
                &self.spec
            }
        }
    };
}

cursor_type!(
    /// Entry point of a query: nothing chosen yet. Evaluates as a full scan
    /// in ascending order.
    QueryInitializer
);

cursor_type!(
    /// A query whose source is chosen; order and filters can still be added.
    Query
);

cursor_type!(
    /// An ordered query. Only filters can be added. Search queries are born
    /// ordered, by relevance.
    OrderedQuery
);

impl<T: Table> QueryInitializer<T> {
    pub fn new() -> Self {
        QueryInitializer::from_spec(QuerySpec::new(T::NAME))
    }

    pub fn full_table_scan(self) -> Query<T> {
        Query::from_spec(self.spec)
    }

    /// Traverse a named index, restricted to the range built by `range`.
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        range: impl FnOnce(IndexRange) -> IndexRange,
    ) -> Query<T> {
        self.spec.source = QuerySource::Index {
            name: name.into(),
            range: range(IndexRange::default()),
        };
        Query::from_spec(self.spec)
    }

    /// Relevance-ranked full-text search on a named search index.
    pub fn with_search_index(
        mut self,
        name: impl Into<String>,
        filter: impl FnOnce(SearchFilter) -> SearchFilter,
    ) -> OrderedQuery<T> {
        self.spec.source = QuerySource::Search {
            index: name.into(),
            filter: filter(SearchFilter::default()),
        };
        OrderedQuery::from_spec(self.spec)
    }

    pub fn order(self, order: Order) -> OrderedQuery<T> {
        self.full_table_scan().order(order)
    }

    pub fn filter(self, expr: FilterExpr) -> Query<T> {
        self.full_table_scan().filter(expr)
    }
}

impl<T: Table> Default for QueryInitializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Table> Query<T> {
    pub fn order(mut self, order: Order) -> OrderedQuery<T> {
        self.spec.order = order;
        OrderedQuery::from_spec(self.spec)
    }

    pub fn filter(mut self, expr: FilterExpr) -> Query<T> {
        self.spec.filters.push(expr);
        self
    }
}

impl<T: Table> OrderedQuery<T> {
    pub fn filter(mut self, expr: FilterExpr) -> OrderedQuery<T> {
        self.spec.filters.push(expr);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    impl Table for Note {
        const NAME: &'static str = "notes";
    }

    #[test]
    fn test_initializer_is_ascending_full_scan() {
        let q = QueryInitializer::<Note>::new();
        assert_eq!(q.spec().table(), "notes");
        assert_eq!(q.spec().source(), &QuerySource::FullScan);
        assert_eq!(q.spec().order(), Order::Asc);
        assert!(q.spec().filters().is_empty());
    }

    #[test]
    fn test_with_index_builds_range() {
        let q = QueryInitializer::<Note>::new()
            .with_index("by_text", |r| r.eq("text", "hello"))
            .order(Order::Desc);
        match q.spec().source() {
            QuerySource::Index { name, range } => {
                assert_eq!(name, "by_text");
                assert_eq!(range.equalities.len(), 1);
            }
            other => panic!("unexpected source {other:?}"),
        }
        assert_eq!(q.spec().order(), Order::Desc);
    }

    #[test]
    fn test_filters_accumulate() {
        let q = QueryInitializer::<Note>::new()
            .filter(field("text").eq("a"))
            .filter(field("tag").eq("b"));
        assert_eq!(q.spec().filters().len(), 2);
    }

    #[test]
    fn test_search_query_keeps_filters() {
        let q = QueryInitializer::<Note>::new()
            .with_search_index("search_text", |s| s.search("text", "Hello").eq("tag", "greeting"))
            .filter(field("text").neq(""));
        assert!(matches!(q.spec().source(), QuerySource::Search { .. }));
        assert_eq!(q.spec().filters().len(), 1);
        assert_eq!(q.spec().order(), Order::Asc);
    }

    #[test]
    fn test_cursor_is_reusable_value() {
        let q = QueryInitializer::<Note>::new().order(Order::Desc);
        let copy = q.clone();
        assert_eq!(q.spec(), copy.spec());
    }
}

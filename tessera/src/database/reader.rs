use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;

use crate::document::Row;
use crate::error::{Result, TesseraError};
use crate::id::{Id, Table};
use crate::pagination::{decode_cursor, encode_cursor, PaginationOptions, PaginationResult};
use crate::query::{Cursor, QueryInitializer, QuerySource, QuerySpec, VectorResult, VectorSearch};
use crate::schema::SchemaDefinition;
use crate::store::{
    DocumentStream, IndexScan, Position, ScanPlan, SearchPlan, Store, VectorSearchRequest,
};

type RowStream<'a, T> = BoxStream<'a, Result<(Position, Row<T>)>>;

/// Read access: `get`, id normalization and the cardinality operators.
#[derive(Clone)]
pub struct DatabaseReader {
    store: Arc<dyn Store>,
    schema: Arc<SchemaDefinition>,
}

impl DatabaseReader {
    pub fn new(store: Arc<dyn Store>, schema: Arc<SchemaDefinition>) -> Self {
        DatabaseReader { store, schema }
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Start a cursor over the table bound to `T`.
    pub fn query<T: Table>(&self) -> QueryInitializer<T> {
        QueryInitializer::new()
    }

    /// Fetch one row. Absent when the id does not resolve against `T`'s table.
    pub async fn get<T: Table>(&self, id: &Id<T>) -> Result<Option<Row<T>>> {
        self.store
            .get(T::NAME, id.as_str())
            .await?
            .map(Row::decode)
            .transpose()
    }

    /// Check that `raw` is an id issued for `T`'s table.
    pub fn normalize_id<T: Table>(&self, raw: &str) -> Option<Id<T>> {
        self.store.normalize_id(T::NAME, raw).map(Id::new)
    }

    /// Every matching row, in cursor order.
    pub async fn collect<C: Cursor>(&self, cursor: &C) -> Result<Vec<Row<C::Doc>>> {
        let spec = cursor.spec();
        let rows: Vec<_> = self
            .matching::<C::Doc>(spec, None)
            .map_ok(|(_, row)| row)
            .try_collect()
            .await?;
        log::debug!("collect on '{}' returned {} row(s)", spec.table(), rows.len());
        Ok(rows)
    }

    /// The first `n` rows in cursor order; fewer if fewer match.
    pub async fn take<C: Cursor>(&self, cursor: &C, n: usize) -> Result<Vec<Row<C::Doc>>> {
        let spec = cursor.spec();
        let rows: Vec<_> = self
            .matching::<C::Doc>(spec, None)
            .take(n)
            .map_ok(|(_, row)| row)
            .try_collect()
            .await?;
        log::debug!("take({n}) on '{}' returned {} row(s)", spec.table(), rows.len());
        Ok(rows)
    }

    /// The first row in cursor order, if any.
    pub async fn first<C: Cursor>(&self, cursor: &C) -> Result<Option<Row<C::Doc>>> {
        let spec = cursor.spec();
        let mut rows = self.matching::<C::Doc>(spec, None);
        let row = rows.try_next().await?.map(|(_, row)| row);
        log::debug!("first on '{}' found {}", spec.table(), found(&row));
        Ok(row)
    }

    /// Same result as [`first`](Self::first), for call sites where any single
    /// match is acceptable and more than one is not a problem.
    pub async fn only_first<C: Cursor>(&self, cursor: &C) -> Result<Option<Row<C::Doc>>> {
        self.first(cursor).await
    }

    /// The single matching row. `None` for no match, `NotUnique` for more
    /// than one. Stops reading after the second match.
    pub async fn unique<C: Cursor>(&self, cursor: &C) -> Result<Option<Row<C::Doc>>> {
        let spec = cursor.spec();
        let mut rows: Vec<_> = self
            .matching::<C::Doc>(spec, None)
            .take(2)
            .map_ok(|(_, row)| row)
            .try_collect()
            .await?;
        log::debug!("unique on '{}' saw {} match(es)", spec.table(), rows.len());

        if rows.len() > 1 {
            return Err(TesseraError::NotUnique);
        }
        Ok(rows.pop())
    }

    /// One page of at most `options.num_items` rows.
    ///
    /// After filling the page, one more match is looked for: when there is
    /// none, `is_done` is set. The continue cursor resumes right after the
    /// last row of this page.
    pub async fn paginate<C: Cursor>(
        &self,
        cursor: &C,
        options: PaginationOptions,
    ) -> Result<PaginationResult<Row<C::Doc>>> {
        let spec = cursor.spec();
        let max = self.schema.limits.max_page_size;
        if options.num_items == 0 || options.num_items > max {
            return Err(TesseraError::InvalidQuery(format!(
                "num_items must be between 1 and {max}, got {}",
                options.num_items
            )));
        }

        let start_after = match &options.cursor {
            Some(token) => decode_cursor(spec, token)?,
            None => None,
        };

        let mut rows = self.matching::<C::Doc>(spec, start_after.clone());
        let mut page = Vec::with_capacity(options.num_items);
        let mut last = start_after;
        while page.len() < options.num_items {
            match rows.try_next().await? {
                Some((position, row)) => {
                    last = Some(position);
                    page.push(row);
                }
                None => break,
            }
        }

        let is_done = page.len() < options.num_items || rows.try_next().await?.is_none();
        log::debug!(
            "paginate on '{}' returned {} row(s), done: {is_done}",
            spec.table(),
            page.len()
        );

        Ok(PaginationResult {
            page,
            is_done,
            continue_cursor: encode_cursor(spec, last)?,
        })
    }

    /// Lazily pull matching rows one at a time. Each call starts a new walk.
    pub fn stream<'a, C: Cursor>(&'a self, cursor: &'a C) -> BoxStream<'a, Result<Row<C::Doc>>> {
        self.matching::<C::Doc>(cursor.spec(), None)
            .map_ok(|(_, row)| row)
            .boxed()
    }

    /// Like [`stream`](Self::stream), yielding `project(row)` for each row.
    pub fn stream_map<'a, C, U, F>(
        &'a self,
        cursor: &'a C,
        project: F,
    ) -> BoxStream<'a, Result<U>>
    where
        C: Cursor,
        U: Send + 'a,
        F: FnMut(Row<C::Doc>) -> U + Send + 'a,
    {
        self.stream(cursor).map_ok(project).boxed()
    }

    /// Nearest neighbours on a vector index, closest first.
    pub async fn vector_search<T: Table>(
        &self,
        search: &VectorSearch<T>,
    ) -> Result<Vec<VectorResult<T>>> {
        let table = self.schema.table(T::NAME)?;
        let index = table.vector_indexes.get(search.index()).ok_or_else(|| {
            TesseraError::InvalidQuery(format!(
                "Vector index '{}' not found on table '{}'",
                search.index(),
                T::NAME
            ))
        })?;

        let max = self.schema.limits.max_vector_results;
        if search.limit_value() == 0 || search.limit_value() > max {
            return Err(TesseraError::InvalidQuery(format!(
                "vector search limit must be between 1 and {max}, got {}",
                search.limit_value()
            )));
        }
        if search.vector().len() != index.dimensions {
            return Err(TesseraError::InvalidQuery(format!(
                "query vector has {} dimensions, index '{}' expects {}",
                search.vector().len(),
                search.index(),
                index.dimensions
            )));
        }
        if let Some((field, _)) = search.filter_value() {
            if !index.filter_fields.contains(field) {
                return Err(TesseraError::InvalidQuery(format!(
                    "'{field}' is not a filter field of vector index '{}'",
                    search.index()
                )));
            }
        }

        let matches = self
            .store
            .vector_search(
                T::NAME,
                VectorSearchRequest {
                    index: search.index().to_string(),
                    vector_field: index.vector_field.clone(),
                    vector: search.vector().to_vec(),
                    limit: search.limit_value(),
                    filter: search.filter_value().cloned(),
                },
            )
            .await?;
        log::debug!("vector search on '{}' returned {} match(es)", T::NAME, matches.len());

        Ok(matches
            .into_iter()
            .map(|m| VectorResult {
                id: Id::new(m.id),
                distance: m.distance,
            })
            .collect())
    }

    /// Decoded rows that pass the cursor's post-filters, with their positions.
    fn matching<'a, T: Table>(
        &'a self,
        spec: &'a QuerySpec,
        start_after: Option<Position>,
    ) -> RowStream<'a, T> {
        let docs = match self.open(spec, start_after) {
            Ok(docs) => docs,
            Err(err) => return stream::once(future::ready(Err(err))).boxed(),
        };

        docs.map_err(TesseraError::from)
            .try_filter(move |doc| future::ready(spec.filters().iter().all(|f| f.matches(doc))))
            .and_then(|doc| {
                let position = doc.position.clone();
                future::ready(Row::<T>::decode(doc).map(|row| (position, row)))
            })
            .boxed()
    }

    /// Check the cursor against the schema and start the store walk.
    fn open<'a>(
        &'a self,
        spec: &'a QuerySpec,
        start_after: Option<Position>,
    ) -> Result<DocumentStream<'a>> {
        let table_name = spec.table();
        let table = self.schema.table(table_name)?;

        match spec.source() {
            QuerySource::FullScan => Ok(self.store.scan(
                table_name,
                ScanPlan {
                    index: None,
                    order: spec.order(),
                    start_after,
                },
            )),
            QuerySource::Index { name, range } => {
                let fields = table.indexes.get(name).ok_or_else(|| {
                    TesseraError::InvalidQuery(format!(
                        "Index '{name}' not found on table '{table_name}'"
                    ))
                })?;
                range.check(fields).map_err(|msg| {
                    TesseraError::InvalidQuery(format!("Index '{name}' on '{table_name}': {msg}"))
                })?;

                Ok(self.store.scan(
                    table_name,
                    ScanPlan {
                        index: Some(IndexScan {
                            name: name.clone(),
                            fields: fields.clone(),
                            range: range.clone(),
                        }),
                        order: spec.order(),
                        start_after,
                    },
                ))
            }
            QuerySource::Search { index, filter } => {
                let definition = table.search_indexes.get(index).ok_or_else(|| {
                    TesseraError::InvalidQuery(format!(
                        "Search index '{index}' not found on table '{table_name}'"
                    ))
                })?;
                filter.check(definition).map_err(|msg| {
                    TesseraError::InvalidQuery(format!(
                        "Search index '{index}' on '{table_name}': {msg}"
                    ))
                })?;
                let (search_field, term) = filter.search.clone().ok_or_else(|| {
                    TesseraError::InvalidQuery("search filter has no search term".to_string())
                })?;

                Ok(self.store.search(
                    table_name,
                    SearchPlan {
                        index: index.clone(),
                        search_field,
                        term,
                        filters: filter.equalities.clone(),
                        start_after,
                    },
                ))
            }
        }
    }
}

fn found<T>(row: &Option<T>) -> &'static str {
    if row.is_some() {
        "a row"
    } else {
        "nothing"
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use super::{
    DocumentStream, PatchDocument, Position, ScanPlan, SearchPlan, StepId, Store, StoreError,
    StoreResult, StoredDocument, VectorMatch, VectorSearchRequest,
};
use crate::query::Order;
use crate::value::{compare_values, lookup_field};

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    created_at: DateTime<Utc>,
    fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
struct Inner {
    /// Table name -> insertion sequence -> document
    tables: HashMap<String, BTreeMap<u64, Entry>>,
    /// Every id ever issued, kept after deletion so ids are never reused
    registry: HashMap<String, (String, u64)>,
    next_seq: u64,
}

/// State captured when a step begins.
#[derive(Debug)]
struct OpenStep {
    id: StepId,
    snapshot: Inner,
}

impl Inner {
    /// Sequence number of a live document, if `id` was issued for `table`.
    fn resolve(&self, table: &str, id: &str) -> Option<u64> {
        let (owner, seq) = self.registry.get(id)?;
        if owner != table {
            return None;
        }
        self.tables.get(table)?.contains_key(seq).then_some(*seq)
    }

    fn entry_mut(&mut self, table: &str, id: &str) -> StoreResult<&mut Entry> {
        let seq = self.resolve(table, id).ok_or_else(|| not_found(table, id))?;
        self.tables
            .get_mut(table)
            .and_then(|docs| docs.get_mut(&seq))
            .ok_or_else(|| not_found(table, id))
    }
}

fn not_found(table: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        table: table.to_string(),
        id: id.to_string(),
    }
}

/// In-process document store.
///
/// Documents live in insertion order per table behind a single lock. Scans
/// and searches snapshot their result set when they start, so a walk sees a
/// consistent view even if writes happen while it is being consumed.
/// Rolling back a step restores the snapshot taken when it began.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    step: Mutex<Option<OpenStep>>,
    next_step: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live documents in a table.
    pub fn len(&self, table: &str) -> usize {
        self.inner.read().tables.get(table).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// Take the open step if `step` is it.
    fn close_step(&self, step: StepId) -> StoreResult<OpenStep> {
        let mut open = self.step.lock();
        match open.take() {
            Some(current) if current.id == step => Ok(current),
            other => {
                *open = other;
                Err(StoreError::Backend(format!("step {} is not open", step.0)))
            }
        }
    }

    fn snapshot_scan(&self, table: &str, plan: &ScanPlan) -> StoreResult<Vec<StoredDocument>> {
        let index_fields: &[String] = match &plan.index {
            Some(index) => &index.fields,
            None => &[],
        };
        let start_after = match &plan.start_after {
            Some(position) => Some(check_position(position, index_fields.len() + 1)?),
            None => None,
        };

        let inner = self.inner.read();
        let docs = match inner.tables.get(table) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };

        let mut keyed: Vec<(Value, &Entry)> = docs
            .iter()
            .filter(|(_, entry)| {
                plan.index
                    .as_ref()
                    .map_or(true, |index| index.range.contains(&entry.fields))
            })
            .map(|(seq, entry)| {
                let mut key: Vec<Value> = index_fields
                    .iter()
                    .map(|f| lookup_field(&entry.fields, f).cloned().unwrap_or(Value::Null))
                    .collect();
                key.push(Value::from(*seq));
                (Value::Array(key), entry)
            })
            .collect();

        keyed.sort_by(|(a, _), (b, _)| compare_values(a, b));
        if plan.order == Order::Desc {
            keyed.reverse();
        }

        let resume_direction = match plan.order {
            Order::Asc => Ordering::Greater,
            Order::Desc => Ordering::Less,
        };

        Ok(keyed
            .into_iter()
            .filter(|(key, _)| {
                start_after
                    .as_ref()
                    .map_or(true, |start| compare_values(key, start) == resume_direction)
            })
            .map(|(key, entry)| stored(table, entry, key))
            .collect())
    }

    fn snapshot_search(&self, table: &str, plan: &SearchPlan) -> StoreResult<Vec<StoredDocument>> {
        let start_after = match &plan.start_after {
            Some(position) => Some(check_position(position, 2)?),
            None => None,
        };

        let terms = tokenize(&plan.term);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.inner.read();
        let docs = match inner.tables.get(table) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };

        let mut ranked: Vec<(Value, &Entry)> = docs
            .iter()
            .filter(|(_, entry)| {
                plan.filters.iter().all(|(field, expected)| {
                    let actual = lookup_field(&entry.fields, field).unwrap_or(&Value::Null);
                    compare_values(actual, expected) == Ordering::Equal
                })
            })
            .filter_map(|(seq, entry)| {
                let text = lookup_field(&entry.fields, &plan.search_field)?.as_str()?;
                let score = relevance(&terms, &tokenize(text));
                // Higher score first: rank key is the negated score, then insertion order
                (score > 0).then(|| {
                    let key = Value::Array(vec![Value::from(-(score as i64)), Value::from(*seq)]);
                    (key, entry)
                })
            })
            .collect();

        ranked.sort_by(|(a, _), (b, _)| compare_values(a, b));

        Ok(ranked
            .into_iter()
            .filter(|(key, _)| {
                start_after
                    .as_ref()
                    .map_or(true, |start| compare_values(key, start) == Ordering::Greater)
            })
            .map(|(key, entry)| stored(table, entry, key))
            .collect())
    }
}

fn stored(table: &str, entry: &Entry, key: Value) -> StoredDocument {
    StoredDocument {
        id: entry.id.clone(),
        table: table.to_string(),
        created_at: entry.created_at,
        fields: entry.fields.clone(),
        position: Position(key),
    }
}

/// A resume position must be a key this store produced: an array of the
/// expected length ending in a sequence number.
fn check_position(position: &Position, expected_len: usize) -> StoreResult<Value> {
    match &position.0 {
        Value::Array(parts) if parts.len() == expected_len => {
            if parts.last().and_then(Value::as_u64).is_some() {
                Ok(position.0.clone())
            } else {
                Err(StoreError::InvalidPosition(
                    "position does not end in a sequence number".to_string(),
                ))
            }
        }
        other => Err(StoreError::InvalidPosition(format!(
            "expected a key of {expected_len} parts, got {other}"
        ))),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Number of query terms found in the document. The last term also matches
/// as a prefix, so partially typed words still hit.
fn relevance(terms: &[String], doc_tokens: &[String]) -> usize {
    let last = terms.len() - 1;
    terms
        .iter()
        .enumerate()
        .filter(|(i, term)| {
            doc_tokens.iter().any(|token| {
                if *i == last {
                    token.starts_with(term.as_str())
                } else {
                    token == *term
                }
            })
        })
        .count()
}

fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin_step(&self) -> StoreResult<StepId> {
        let mut open = self.step.lock();
        if let Some(stale) = open.as_ref() {
            // Its caller went away without finishing; keep what it wrote
            log::warn!("Step {} was never finished, committing it", stale.id.0);
        }
        let id = StepId(self.next_step.fetch_add(1, AtomicOrdering::Relaxed));
        *open = Some(OpenStep {
            id,
            snapshot: self.inner.read().clone(),
        });
        Ok(id)
    }

    async fn commit_step(&self, step: StepId) -> StoreResult<()> {
        self.close_step(step)?;
        Ok(())
    }

    async fn rollback_step(&self, step: StepId) -> StoreResult<()> {
        let OpenStep { mut snapshot, .. } = self.close_step(step)?;
        let mut inner = self.inner.write();
        // Sequence numbers stay monotonic across a rollback
        snapshot.next_seq = inner.next_seq;
        *inner = snapshot;
        log::debug!("Rolled back step {}", step.0);
        Ok(())
    }

    async fn insert(&self, table: &str, fields: Map<String, Value>) -> StoreResult<String> {
        let mut inner = self.inner.write();
        let id = ulid::Ulid::new().to_string().to_lowercase();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        inner.registry.insert(id.clone(), (table.to_string(), seq));
        inner.tables.entry(table.to_string()).or_default().insert(
            seq,
            Entry {
                id: id.clone(),
                created_at: Utc::now(),
                fields,
            },
        );
        log::trace!("Inserted {table}/{id}");
        Ok(id)
    }

    async fn get(&self, table: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        let inner = self.inner.read();
        let seq = match inner.resolve(table, id) {
            Some(seq) => seq,
            None => return Ok(None),
        };
        Ok(inner
            .tables
            .get(table)
            .and_then(|docs| docs.get(&seq))
            .map(|entry| stored(table, entry, Value::Array(vec![Value::from(seq)]))))
    }

    async fn patch(&self, table: &str, id: &str, patch: PatchDocument) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let entry = inner.entry_mut(table, id)?;
        patch.apply_to(&mut entry.fields);
        Ok(())
    }

    async fn replace(&self, table: &str, id: &str, fields: Map<String, Value>) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let entry = inner.entry_mut(table, id)?;
        entry.fields = fields;
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let seq = inner.resolve(table, id).ok_or_else(|| not_found(table, id))?;
        if let Some(docs) = inner.tables.get_mut(table) {
            docs.remove(&seq);
        }
        log::trace!("Deleted {table}/{id}");
        Ok(())
    }

    fn scan<'a>(&'a self, table: &'a str, plan: ScanPlan) -> DocumentStream<'a> {
        match self.snapshot_scan(table, &plan) {
            Ok(docs) => stream::iter(docs.into_iter().map(Ok)).boxed(),
            Err(err) => stream::once(async move { Err(err) }).boxed(),
        }
    }

    fn search<'a>(&'a self, table: &'a str, plan: SearchPlan) -> DocumentStream<'a> {
        match self.snapshot_search(table, &plan) {
            Ok(docs) => stream::iter(docs.into_iter().map(Ok)).boxed(),
            Err(err) => stream::once(async move { Err(err) }).boxed(),
        }
    }

    async fn vector_search(
        &self,
        table: &str,
        request: VectorSearchRequest,
    ) -> StoreResult<Vec<VectorMatch>> {
        let inner = self.inner.read();
        let docs = match inner.tables.get(table) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };

        let mut matches: Vec<(f64, u64, &Entry)> = docs
            .iter()
            .filter(|(_, entry)| match &request.filter {
                Some((field, expected)) => {
                    let actual = lookup_field(&entry.fields, field).unwrap_or(&Value::Null);
                    compare_values(actual, expected) == Ordering::Equal
                }
                None => true,
            })
            .filter_map(|(seq, entry)| {
                let raw = lookup_field(&entry.fields, &request.vector_field)?.as_array()?;
                let vector: Vec<f64> = raw.iter().map(Value::as_f64).collect::<Option<_>>()?;
                (vector.len() == request.vector.len())
                    .then(|| (euclidean_distance(&vector, &request.vector), *seq, entry))
            })
            .collect();

        matches.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        matches.truncate(request.limit);

        Ok(matches
            .into_iter()
            .map(|(distance, _, entry)| VectorMatch {
                id: entry.id.clone(),
                distance,
            })
            .collect())
    }

    fn normalize_id(&self, table: &str, raw: &str) -> Option<String> {
        let inner = self.inner.read();
        match inner.registry.get(raw) {
            Some((owner, _)) if owner == table => Some(raw.to_string()),
            _ => None,
        }
    }
}

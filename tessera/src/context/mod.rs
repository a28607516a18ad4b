//! Function contexts.
//!
//! A [`Runtime`] bundles the collaborators. Each query, mutation or action
//! gets a context scoped to what it may do: queries read, mutations read
//! and write, actions talk to collaborators and run queries and mutations
//! as separate steps.

use futures::lock::Mutex;
use std::future::Future;
use std::sync::Arc;

use crate::auth::{Auth, StaticAuth};
use crate::database::{DatabaseReader, DatabaseWriter};
use crate::error::Result;
use crate::id::Table;
use crate::query::{VectorResult, VectorSearch};
use crate::scheduler::{MemoryScheduler, Scheduler};
use crate::schema::SchemaDefinition;
use crate::storage::{BlobStorage, MemoryBlobStorage, StorageReader, StorageWriter};
use crate::store::{MemoryStore, Store};

#[derive(Clone)]
pub struct Runtime {
    store: Arc<dyn Store>,
    schema: Arc<SchemaDefinition>,
    auth: Arc<dyn Auth>,
    storage: Arc<dyn BlobStorage>,
    scheduler: Arc<dyn Scheduler>,
    steps: Arc<Mutex<()>>,
}

impl Runtime {
    /// A runtime over `store`, anonymous, with in-memory blob storage and
    /// scheduler.
    pub fn new(store: Arc<dyn Store>, schema: SchemaDefinition) -> Self {
        Runtime {
            store,
            schema: Arc::new(schema),
            auth: Arc::new(StaticAuth::anonymous()),
            storage: Arc::new(MemoryBlobStorage::new()),
            scheduler: Arc::new(MemoryScheduler::new()),
            steps: Arc::new(Mutex::new(())),
        }
    }

    pub fn in_memory(schema: SchemaDefinition) -> Self {
        Self::new(Arc::new(MemoryStore::new()), schema)
    }

    pub fn with_auth(mut self, auth: Arc<dyn Auth>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn BlobStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    pub fn query_ctx(&self) -> QueryCtx {
        QueryCtx {
            db: DatabaseReader::new(self.store.clone(), self.schema.clone()),
            auth: self.auth.clone(),
            storage: StorageReader::new(self.storage.clone()),
        }
    }

    pub fn mutation_ctx(&self) -> MutationCtx {
        MutationCtx {
            db: DatabaseWriter::new(self.store.clone(), self.schema.clone()),
            auth: self.auth.clone(),
            storage: StorageWriter::new(self.storage.clone()),
            scheduler: self.scheduler.clone(),
        }
    }

    pub fn action_ctx(&self) -> ActionCtx {
        ActionCtx {
            auth: self.auth.clone(),
            storage: StorageWriter::new(self.storage.clone()),
            scheduler: self.scheduler.clone(),
            runtime: self.clone(),
        }
    }

    /// Run a query function in its own step.
    pub async fn run_query<F, Fut, R>(&self, query: F) -> Result<R>
    where
        F: FnOnce(QueryCtx) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        query(self.query_ctx()).await
    }

    /// Run a mutation function in its own step. On error the step is rolled
    /// back and the error returned.
    pub async fn run_mutation<F, Fut, R>(&self, mutation: F) -> Result<R>
    where
        F: FnOnce(MutationCtx) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let _turn = self.steps.lock().await;
        let step = self.store.begin_step().await?;

        match mutation(self.mutation_ctx()).await {
            Ok(value) => {
                self.store.commit_step(step).await?;
                Ok(value)
            }
            Err(err) => {
                log::debug!("Mutation failed, rolling back step {}: {err}", step.0);
                if let Err(rollback) = self.store.rollback_step(step).await {
                    log::error!("Rollback of step {} failed: {rollback}", step.0);
                }
                Err(err)
            }
        }
    }
}

#[derive(Clone)]
pub struct QueryCtx {
    pub db: DatabaseReader,
    pub auth: Arc<dyn Auth>,
    pub storage: StorageReader,
}

#[derive(Clone)]
pub struct MutationCtx {
    pub db: DatabaseWriter,
    pub auth: Arc<dyn Auth>,
    pub storage: StorageWriter,
    pub scheduler: Arc<dyn Scheduler>,
}

/// Context of an action. Actions have no direct database access; they read
/// and write through [`run_query`](Self::run_query) and
/// [`run_mutation`](Self::run_mutation).
#[derive(Clone)]
pub struct ActionCtx {
    pub auth: Arc<dyn Auth>,
    pub storage: StorageWriter,
    pub scheduler: Arc<dyn Scheduler>,
    runtime: Runtime,
}

impl ActionCtx {
    pub async fn vector_search<T: Table>(
        &self,
        search: &VectorSearch<T>,
    ) -> Result<Vec<VectorResult<T>>> {
        self.runtime.query_ctx().db.vector_search(search).await
    }

    pub async fn run_query<F, Fut, R>(&self, query: F) -> Result<R>
    where
        F: FnOnce(QueryCtx) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.runtime.run_query(query).await
    }

    pub async fn run_mutation<F, Fut, R>(&self, mutation: F) -> Result<R>
    where
        F: FnOnce(MutationCtx) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.runtime.run_mutation(mutation).await
    }
}

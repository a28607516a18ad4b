pub mod auth;
pub mod context;
pub mod database;
pub mod document;
pub mod error;
pub mod id;
pub mod pagination;
pub mod patch;
pub mod query;
pub mod scheduler;
pub mod schema;
pub mod storage;
pub mod store;
pub mod validation;
pub mod value;

pub use auth::{Auth, UserIdentity};
pub use context::{ActionCtx, MutationCtx, QueryCtx, Runtime};
pub use database::{DatabaseReader, DatabaseWriter};
pub use document::Row;
pub use error::{Result, TesseraError};
pub use id::{Id, Table};
pub use pagination::{ContinueCursor, PaginationOptions, PaginationResult};
pub use patch::Patch;
pub use query::{
    field, literal, Cursor, FilterExpr, IndexRange, Order, OrderedQuery, Query, QueryInitializer,
    SearchFilter, VectorResult, VectorSearch,
};
pub use schema::SchemaDefinition;
pub use store::{MemoryStore, Store};

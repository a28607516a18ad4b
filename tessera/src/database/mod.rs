//! Typed access to the store.
//!
//! [`DatabaseReader`] evaluates cursors through the cardinality operators;
//! [`DatabaseWriter`] adds the validated mutations. Both are cheap to clone
//! and share the store and schema.

mod reader;
mod writer;

pub use reader::DatabaseReader;
pub use writer::DatabaseWriter;

use serde::Serialize;
use serde_json::{Map, Value};
use std::ops::Deref;
use std::sync::Arc;

use super::DatabaseReader;
use crate::error::{Result, TesseraError};
use crate::id::{Id, Table};
use crate::patch::to_patch_document;
use crate::schema::{SchemaDefinition, TableDefinition};
use crate::store::{FieldPatch, Store};
use crate::validation::{self, IdReference};
use crate::value::strip_nulls;

/// Read and write access. Every write is validated against the schema
/// before the store is asked to perform it.
#[derive(Clone)]
pub struct DatabaseWriter {
    reader: DatabaseReader,
}

impl DatabaseWriter {
    pub fn new(store: Arc<dyn Store>, schema: Arc<SchemaDefinition>) -> Self {
        DatabaseWriter {
            reader: DatabaseReader::new(store, schema),
        }
    }

    pub fn reader(&self) -> &DatabaseReader {
        &self.reader
    }

    /// Insert a new row and return its id.
    pub async fn insert<T: Table>(&self, row: &T) -> Result<Id<T>> {
        let table = self.schema().table(T::NAME)?;
        let mut fields = to_fields(T::NAME, row)?;
        self.prepare(T::NAME, table, &mut fields)?;

        let id = self.store().insert(T::NAME, fields).await?;
        log::debug!("Inserted {}/{id}", T::NAME);
        Ok(Id::new(id))
    }

    /// Apply a partial update. `patch` is any serializable object, usually
    /// a struct of [`Patch`](crate::Patch) fields. Only the fields it
    /// mentions are validated; unset fields are removed from the document.
    pub async fn patch<T: Table, P: Serialize + ?Sized>(&self, id: &Id<T>, patch: &P) -> Result<()> {
        let table = self.schema().table(T::NAME)?;
        let patch = to_patch_document(T::NAME, serde_json::to_value(patch)?)?;

        let mut errors = validation::validate_partial(self.schema(), table, &patch).errors;
        for (field_name, change) in &patch.fields {
            if let (FieldPatch::Set(value), Some(def)) = (change, table.fields.get(field_name)) {
                let refs = validation::field_references(self.schema(), field_name, def, value);
                self.check_references(&refs, &mut errors);
            }
        }
        if !errors.is_empty() {
            return Err(TesseraError::validation(T::NAME, errors));
        }

        self.store().patch(T::NAME, id.as_str(), patch).await?;
        log::debug!("Patched {}/{}", T::NAME, id);
        Ok(())
    }

    /// Overwrite all fields of a row. Fields absent from `row` are dropped.
    pub async fn replace<T: Table>(&self, id: &Id<T>, row: &T) -> Result<()> {
        let table = self.schema().table(T::NAME)?;
        let mut fields = to_fields(T::NAME, row)?;
        self.prepare(T::NAME, table, &mut fields)?;

        self.store().replace(T::NAME, id.as_str(), fields).await?;
        log::debug!("Replaced {}/{}", T::NAME, id);
        Ok(())
    }

    pub async fn delete<T: Table>(&self, id: &Id<T>) -> Result<()> {
        self.store().delete(T::NAME, id.as_str()).await?;
        log::debug!("Deleted {}/{}", T::NAME, id);
        Ok(())
    }

    /// Defaults, validation, then a check that id values point into their
    /// target tables.
    fn prepare(
        &self,
        table_name: &str,
        table: &TableDefinition,
        fields: &mut Map<String, Value>,
    ) -> Result<()> {
        validation::validate_and_prepare(self.schema(), table_name, table, fields)?;

        let mut errors = Vec::new();
        let refs = validation::document_references(self.schema(), table, fields);
        self.check_references(&refs, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(TesseraError::validation(table_name, errors))
        }
    }

    /// Every id, at any depth, must resolve in its target table.
    fn check_references(&self, refs: &[IdReference], errors: &mut Vec<String>) {
        for IdReference { path, table, id } in refs {
            if self.store().normalize_id(table, id).is_none() {
                errors.push(format!(
                    "Field '{path}' value '{id}' is not an id of table '{table}'"
                ));
            }
        }
    }
}

impl Deref for DatabaseWriter {
    type Target = DatabaseReader;

    fn deref(&self) -> &DatabaseReader {
        &self.reader
    }
}

/// Serialize a row into document fields, dropping `null`s.
fn to_fields<T: Serialize>(table: &str, row: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(row)? {
        Value::Object(mut fields) => {
            strip_nulls(&mut fields);
            Ok(fields)
        }
        other => Err(TesseraError::validation(
            table,
            vec![format!(
                "Row must serialize to an object, got {}",
                crate::value::type_name(&other)
            )],
        )),
    }
}

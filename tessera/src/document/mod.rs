// Decoded rows: system fields plus typed data

use chrono::{DateTime, Utc};
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::ops::Deref;

use crate::error::{Result, TesseraError};
use crate::id::{Id, Table};
use crate::store::StoredDocument;

/// A document read from the store, decoded into its row type.
///
/// A row is a snapshot: writing through the database does not update rows
/// that were already read.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<T> {
    pub id: Id<T>,
    pub created_at: DateTime<Utc>,
    pub data: T,
}

impl<T: Table> Row<T> {
    pub(crate) fn decode(doc: StoredDocument) -> Result<Self> {
        let StoredDocument {
            id,
            table,
            created_at,
            fields,
            ..
        } = doc;
        let data = serde_json::from_value(Value::Object(fields))
            .map_err(|err| TesseraError::decode(&table, &id, err))?;
        Ok(Row {
            id: Id::new(id),
            created_at,
            data,
        })
    }
}

impl<T> Row<T> {
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> Deref for Row<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

/// Serializes as the flat document: `_id`, `_creationTime` (epoch millis)
/// and the data fields.
impl<T: Serialize> Serialize for Row<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = match serde_json::to_value(&self.data).map_err(S::Error::custom)? {
            Value::Object(fields) => fields,
            other => return Err(S::Error::custom(format!("row data must be an object, got {other}"))),
        };

        let mut map = serializer.serialize_map(Some(fields.len() + 2))?;
        map.serialize_entry("_id", self.id.as_str())?;
        map.serialize_entry("_creationTime", &self.created_at.timestamp_millis())?;
        for (key, value) in &fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

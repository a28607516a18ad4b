// Typed partial updates with explicit field removal

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TesseraError};
use crate::store::{FieldPatch, PatchDocument};
use crate::value::strip_nulls;

/// Marker key of the serialized unset sentinel: `{"$unset": true}`.
///
/// That exact object is reserved. Written to an `any` or free-form `object`
/// field through a patch, it removes the field instead of being stored.
pub const UNSET_KEY: &str = "$unset";

/// One field of a partial update.
///
/// `Keep` leaves the stored value alone, `Set` overwrites it, and `Unset`
/// removes the field from the document. Patch structs declare their fields
/// as `#[serde(default, skip_serializing_if = "Patch::is_keep")]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Keep,
    Set(T),
    Unset,
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            _ => None,
        }
    }
}

/// `Some` sets the field, `None` removes it.
impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Set(v),
            None => Patch::Unset,
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            // null means "keep" once it reaches a PatchDocument
            Patch::Keep => serializer.serialize_none(),
            Patch::Set(value) => value.serialize(serializer),
            Patch::Unset => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(UNSET_KEY, &true)?;
                map.end()
            }
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Patch::Keep);
        }
        if is_unset_marker(&value) {
            return Ok(Patch::Unset);
        }
        T::deserialize(value).map(Patch::Set).map_err(de::Error::custom)
    }
}

fn is_unset_marker(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => map.len() == 1 && map.get(UNSET_KEY) == Some(&Value::Bool(true)),
        None => false,
    }
}

/// Turn a serialized patch object into a [`PatchDocument`]: `null` entries
/// are kept as-is, unset markers become removals, anything else is set.
pub fn to_patch_document(table: &str, value: Value) -> Result<PatchDocument> {
    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(TesseraError::validation(
                table,
                vec![format!(
                    "Patch must be an object, got {}",
                    crate::value::type_name(&other)
                )],
            ))
        }
    };

    let mut patch = PatchDocument::default();
    for (field, value) in fields {
        if value.is_null() {
            continue;
        }
        if is_unset_marker(&value) {
            patch.fields.insert(field, FieldPatch::Unset);
            continue;
        }
        let value = match value {
            Value::Object(mut nested) => {
                strip_nulls(&mut nested);
                Value::Object(nested)
            }
            other => other,
        };
        patch.fields.insert(field, FieldPatch::Set(value));
    }
    Ok(patch)
}

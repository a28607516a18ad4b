// Table-tagged document identifiers

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A row type bound to a table in the schema.
///
/// Usually implemented by code generated from `schema.yaml`, but a
/// hand-written impl works the same way:
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Note {
///     text: String,
/// }
///
/// impl tessera::Table for Note {
///     const NAME: &'static str = "notes";
/// }
/// ```
pub trait Table: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
}

/// Identifier of a document in the table bound to `T`.
///
/// The raw value is whatever opaque string the store issued. The tag only
/// exists at compile time: an `Id<Note>` cannot be passed where an
/// `Id<User>` is expected. Nothing is checked when one is constructed; the
/// store resolves it against the asserted table when it is used.
pub struct Id<T> {
    raw: String,
    _table: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn new(raw: impl Into<String>) -> Self {
        Id {
            raw: raw.into(),
            _table: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn into_inner(self) -> String {
        self.raw
    }
}

impl<T: Table> Id<T> {
    pub fn table_name(&self) -> &'static str {
        T::NAME
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Id::new(self.raw.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Id").field(&self.raw).finish()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl<T> AsRef<str> for Id<T> {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Id::new)
    }
}

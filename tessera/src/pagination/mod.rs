// Cursor-based pagination tokens

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{Result, TesseraError};
use crate::query::QuerySpec;
use crate::store::Position;

/// Opaque token marking where the next page starts.
///
/// Only valid for a cursor with exactly the same shape as the one that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinueCursor(String);

impl ContinueCursor {
    /// Wrap a token received from a client.
    pub fn new(token: impl Into<String>) -> Self {
        ContinueCursor(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinueCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationOptions {
    pub num_items: usize,
    pub cursor: Option<ContinueCursor>,
}

impl PaginationOptions {
    /// The first page.
    pub fn first(num_items: usize) -> Self {
        PaginationOptions {
            num_items,
            cursor: None,
        }
    }

    /// The page following the one that returned `cursor`.
    pub fn after(num_items: usize, cursor: ContinueCursor) -> Self {
        PaginationOptions {
            num_items,
            cursor: Some(cursor),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginationResult<R> {
    pub page: Vec<R>,
    pub is_done: bool,
    pub continue_cursor: ContinueCursor,
}

#[derive(Serialize, Deserialize)]
struct Token {
    /// Shape fingerprint of the cursor
    s: String,
    /// Position of the last row handed out, `None` before the first row
    p: Option<Position>,
}

/// Fingerprint of a cursor's shape: table, source, order and filters,
/// hashed from the JSON form of the plan.
fn fingerprint(spec: &QuerySpec) -> Result<String> {
    let digest = Sha256::digest(serde_json::to_vec(spec)?);
    Ok(digest
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect())
}

pub(crate) fn encode_cursor(spec: &QuerySpec, position: Option<Position>) -> Result<ContinueCursor> {
    let token = Token {
        s: fingerprint(spec)?,
        p: position,
    };
    let json = serde_json::to_vec(&token)?;
    Ok(ContinueCursor(URL_SAFE_NO_PAD.encode(json)))
}

/// Decode a token back into the position it resumes after.
pub(crate) fn decode_cursor(spec: &QuerySpec, cursor: &ContinueCursor) -> Result<Option<Position>> {
    let bytes = URL_SAFE_NO_PAD.decode(cursor.as_str()).map_err(|err| {
        log::warn!("Rejected malformed pagination cursor for '{}': {err}", spec.table());
        TesseraError::InvalidCursor(format!("not a valid cursor token: {err}"))
    })?;
    let token: Token = serde_json::from_slice(&bytes).map_err(|err| {
        log::warn!("Rejected malformed pagination cursor for '{}': {err}", spec.table());
        TesseraError::InvalidCursor(format!("not a valid cursor token: {err}"))
    })?;

    if token.s != fingerprint(spec)? {
        log::warn!("Rejected pagination cursor issued for another query on '{}'", spec.table());
        return Err(TesseraError::InvalidCursor(
            "cursor was issued for a different query".to_string(),
        ));
    }
    Ok(token.p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Table;
    use crate::query::{field, Cursor, Order, QueryInitializer};
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    impl Table for Note {
        const NAME: &'static str = "notes";
    }

    #[test]
    fn test_cursor_resumes_same_shape() {
        let query = QueryInitializer::<Note>::new().order(Order::Desc);
        let position = Position(json!([3]));

        let cursor = encode_cursor(query.spec(), Some(position.clone())).unwrap();
        let decoded = decode_cursor(query.clone().spec(), &cursor).unwrap();
        assert_eq!(decoded, Some(position));

        let start = encode_cursor(query.spec(), None).unwrap();
        assert_eq!(decode_cursor(query.spec(), &start).unwrap(), None);
    }

    #[test]
    fn test_cursor_rejected_for_other_shape() {
        let desc = QueryInitializer::<Note>::new().order(Order::Desc);
        let asc = QueryInitializer::<Note>::new().order(Order::Asc);
        let filtered = QueryInitializer::<Note>::new()
            .filter(field("text").eq("a"))
            .order(Order::Desc);

        let cursor = encode_cursor(desc.spec(), Some(Position(json!([1])))).unwrap();
        assert!(matches!(
            decode_cursor(asc.spec(), &cursor),
            Err(TesseraError::InvalidCursor(_))
        ));
        assert!(decode_cursor(filtered.spec(), &cursor).is_err());
    }

    #[test]
    fn test_fingerprint_is_pinned_to_plan_json() {
        let query = QueryInitializer::<Note>::new().order(Order::Desc);
        assert_eq!(
            serde_json::to_value(query.spec()).unwrap(),
            json!({ "table": "notes", "source": "full_scan", "order": "desc", "filters": [] })
        );
        assert_eq!(fingerprint(query.spec()).unwrap(), "a60218eeef75acc7");
    }

    #[test]
    fn test_garbled_cursor_rejected() {
        let query = QueryInitializer::<Note>::new();
        for token in ["", "!!!", "bm90IGpzb24"] {
            let err = decode_cursor(query.spec(), &ContinueCursor::new(token)).unwrap_err();
            assert!(matches!(err, TesseraError::InvalidCursor(_)), "{token}: {err}");
            assert_eq!(err.failure_tag(), None);
        }
    }

    #[test]
    fn test_cursor_serializes_as_string() {
        let cursor = ContinueCursor::new("abc");
        assert_eq!(serde_json::to_value(&cursor).unwrap(), json!("abc"));
        assert_eq!(cursor.to_string(), "abc");
    }
}

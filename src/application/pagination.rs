//! Cursor pagination over document-store queries.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::application::repos::QueryPage;

/// Opaque resume point handed back by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marker(String);

impl Marker {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PositionPayload {
    sort_key: Value,
    id: String,
}

/// Position of a document within an ordered query: its sort-field value
/// (e.g. `createdAt`) and id as a tie-breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    sort_key: Value,
    id: String,
}

impl Position {
    pub fn new(sort_key: Value, id: impl Into<String>) -> Self {
        Self {
            sort_key,
            id: id.into(),
        }
    }

    pub fn sort_key(&self) -> &Value {
        &self.sort_key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn encode(&self) -> Marker {
        let payload = serde_json::json!({
            "sort_key": self.sort_key,
            "id": self.id,
        });
        Marker(URL_SAFE_NO_PAD.encode(payload.to_string()))
    }

    pub fn decode(marker: &Marker) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(marker.as_str())
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: PositionPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            sort_key: payload.sort_key,
            id: payload.id,
        })
    }
}

/// Resume state for "load more" over one query shape.
///
/// The marker only moves forward on full pages; a short page means the end
/// was reached and the next call would return nothing new.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginationCursor {
    shape: String,
    last_seen: Option<Marker>,
}

impl PaginationCursor {
    /// Cursor for the query identified by `shape` (e.g. `"blogs:all"`).
    pub fn for_query(shape: impl Into<String>) -> Self {
        Self {
            shape: shape.into(),
            last_seen: None,
        }
    }

    pub fn shape(&self) -> &str {
        &self.shape
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.last_seen.as_ref()
    }

    pub fn is_at_start(&self) -> bool {
        self.last_seen.is_none()
    }

    /// Record `page`; returns whether more pages may follow.
    pub fn advance(&mut self, page: &QueryPage, page_size: usize) -> bool {
        let full = page_size > 0 && page.documents.len() == page_size;
        if full {
            if let Some(marker) = page.last_marker.clone() {
                self.last_seen = Some(marker);
            }
        }
        debug!(
            shape = %self.shape,
            fetched = page.documents.len(),
            page_size,
            has_more = full,
            "Pagination cursor advanced"
        );
        full
    }

    /// Resume after `marker` without fetching (e.g. when a page came from
    /// the cache).
    pub fn seek(&mut self, marker: Marker) {
        self.last_seen = Some(marker);
    }

    pub fn reset(&mut self) {
        self.last_seen = None;
    }

    /// Point the cursor at `shape`, resetting it if the query changed.
    ///
    /// Returns whether a reset happened.
    pub fn rebind(&mut self, shape: &str) -> bool {
        if self.shape == shape {
            return false;
        }
        self.shape = shape.to_string();
        self.reset();
        true
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::repos::StoredDocument;

    fn page(ids: &[&str]) -> QueryPage {
        let documents: Vec<StoredDocument> = ids
            .iter()
            .map(|id| StoredDocument::new(*id, json!({})))
            .collect();
        let last_marker = ids
            .last()
            .map(|id| Position::new(json!("2024-01-01T00:00:00Z"), *id).encode());
        QueryPage {
            documents,
            last_marker,
        }
    }

    #[test]
    fn position_round_trip() {
        let position = Position::new(json!("2024-03-01T10:00:00Z"), "post-9");
        let decoded = Position::decode(&position.encode()).expect("decoded position");

        assert_eq!(decoded.id(), "post-9");
        assert_eq!(decoded.sort_key(), &json!("2024-03-01T10:00:00Z"));
    }

    #[test]
    fn decoding_invalid_marker_reports_error() {
        let err = Position::decode(&Marker::new("not base64!")).expect_err("rejected");
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
    }

    #[test]
    fn full_page_moves_marker() {
        let mut cursor = PaginationCursor::for_query("blogs:all");
        assert!(cursor.is_at_start());

        let first = page(&["a", "b"]);
        assert!(cursor.advance(&first, 2));
        assert_eq!(cursor.marker(), first.last_marker.as_ref());
    }

    #[test]
    fn short_page_keeps_marker() {
        let mut cursor = PaginationCursor::for_query("blogs:all");
        let first = page(&["a", "b"]);
        cursor.advance(&first, 2);

        assert!(!cursor.advance(&page(&["c"]), 2));
        assert_eq!(cursor.marker(), first.last_marker.as_ref());

        assert!(!cursor.advance(&page(&[]), 2));
        assert_eq!(cursor.marker(), first.last_marker.as_ref());
    }

    #[test]
    fn reset_and_rebind() {
        let mut cursor = PaginationCursor::for_query("blogs:all");
        cursor.advance(&page(&["a"]), 1);
        assert!(!cursor.rebind("blogs:all"));
        assert!(!cursor.is_at_start());

        assert!(cursor.rebind("blogs:user:u1"));
        assert!(cursor.is_at_start());
        assert_eq!(cursor.shape(), "blogs:user:u1");

        cursor.advance(&page(&["b"]), 1);
        cursor.reset();
        assert!(cursor.marker().is_none());
    }
}

//! Cached document model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Locally cached copy of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDocument {
    /// Document identifier, shared with the remote
    pub document_id: String,
    /// Document tree as produced by the editor
    pub content: Value,
    /// Last local write (Unix ms)
    pub last_modified: i64,
    /// Last confirmed sync (Unix ms); cleared by every unsynced local write
    pub synced_at: Option<i64>,
}

impl CachedDocument {
    /// Create a cached document written at `now`.
    #[must_use]
    pub fn new(document_id: impl Into<String>, content: Value, now: i64) -> Self {
        Self {
            document_id: document_id.into(),
            content,
            last_modified: now,
            synced_at: None,
        }
    }

    /// Whether the cached content has been confirmed by the remote.
    pub fn is_synced(&self) -> bool {
        self.synced_at
            .is_some_and(|synced_at| synced_at >= self.last_modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_document_is_unsynced() {
        let doc = CachedDocument::new("d1", json!({"type": "doc"}), 100);
        assert_eq!(doc.last_modified, 100);
        assert!(doc.synced_at.is_none());
        assert!(!doc.is_synced());
    }

    #[test]
    fn synced_only_when_stamp_covers_last_write() {
        let mut doc = CachedDocument::new("d1", json!({}), 100);
        doc.synced_at = Some(90);
        assert!(!doc.is_synced());
        doc.synced_at = Some(100);
        assert!(doc.is_synced());
    }
}

//! Cached document operations

use serde_json::Value;

use super::OfflineSync;
use crate::db::{Collection, IndexLookup, KeyValueStore, StoredRecord};
use crate::error::Result;
use crate::models::{CachedDocument, SyncConflict};
use crate::util::require_identifier;

impl<S: KeyValueStore> OfflineSync<S> {
    /// Cache the latest local content of a document.
    ///
    /// `synced_at` is cleared unless the instance is connected, in which case
    /// the write counts as already synced.
    pub async fn cache_document(&self, document_id: &str, content: Value) -> Result<CachedDocument> {
        let document_id = require_identifier(document_id, "document_id")?;
        let _writes = self.writes.lock().await;
        self.store_content(document_id, content).await
    }

    /// Write new content; the caller holds the write lock.
    pub(super) async fn store_content(
        &self,
        document_id: String,
        content: Value,
    ) -> Result<CachedDocument> {
        let now = self.clock.now_millis();

        let mut document = CachedDocument::new(document_id, content, now);
        if self.connection_status().is_connected() {
            document.synced_at = Some(now);
        }

        self.write_document(&document).await?;
        tracing::debug!(
            document_id = %document.document_id,
            synced = document.synced_at.is_some(),
            "Cached document"
        );
        Ok(document)
    }

    pub async fn get_cached_document(&self, document_id: &str) -> Result<Option<CachedDocument>> {
        let document_id = require_identifier(document_id, "document_id")?;
        self.store
            .get(Collection::Documents, &document_id)
            .await?
            .map(|record| record.decode())
            .transpose()
    }

    /// Remove a document with its queued changes and unresolved conflicts in one step.
    ///
    /// Resolved conflicts are kept as history. Returns the number of records removed.
    pub async fn clear_document_cache(&self, document_id: &str) -> Result<u64> {
        let document_id = require_identifier(document_id, "document_id")?;
        let _writes = self.writes.lock().await;

        let mut batch = vec![(Collection::Documents, document_id.clone())];
        batch.extend(
            self.store
                .find(Collection::Changes, IndexLookup::DocumentId(&document_id))
                .await?
                .into_iter()
                .map(|record| (Collection::Changes, record.key)),
        );
        for record in self
            .store
            .find(Collection::Conflicts, IndexLookup::DocumentId(&document_id))
            .await?
        {
            let conflict: SyncConflict = record.decode()?;
            if !conflict.resolved {
                batch.push((Collection::Conflicts, record.key));
            }
        }

        let removed = self.store.delete_batch(&batch).await?;
        tracing::info!("Cleared offline cache for {document_id} ({removed} records)");
        Ok(removed)
    }

    /// Cached documents written at or after `since`, oldest first.
    pub async fn documents_modified_since(&self, since: i64) -> Result<Vec<CachedDocument>> {
        self.store
            .find(Collection::Documents, IndexLookup::ModifiedSince(since))
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }

    /// Cached documents whose latest content has not been confirmed by a sync.
    pub async fn unsynced_documents(&self) -> Result<Vec<CachedDocument>> {
        Ok(self
            .documents_modified_since(i64::MIN)
            .await?
            .into_iter()
            .filter(|document| !document.is_synced())
            .collect())
    }

    /// Stamp `synced_at` on a cached document whose content predates `synced_at`.
    ///
    /// Content written at or after `synced_at` was not part of the confirmed
    /// sync and stays unsynced. Returns whether the stamp was applied.
    pub(super) async fn mark_synced(&self, document_id: &str, synced_at: i64) -> Result<bool> {
        let _writes = self.writes.lock().await;
        let Some(mut document) = self.get_cached_document(document_id).await? else {
            return Ok(false);
        };
        if document.last_modified >= synced_at {
            tracing::debug!("Document {document_id} changed during sync, leaving it unsynced");
            return Ok(false);
        }
        document.synced_at = Some(synced_at);
        self.write_document(&document).await?;
        Ok(true)
    }

    async fn write_document(&self, document: &CachedDocument) -> Result<()> {
        let record = StoredRecord::encode(
            &document.document_id,
            &document.document_id,
            document.last_modified,
            document,
        )?;
        self.store.put(Collection::Documents, record).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{service, yielding_service, START};
    use crate::db::MemoryStore;
    use crate::error::Error;
    use crate::models::NewChange;
    use crate::state::ConnectionStatus;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn cache_document_upserts_and_clears_synced_at() {
        let (sync, clock) = service();

        let first = sync.cache_document("d1", json!({"v": 1})).await.unwrap();
        assert_eq!(first.last_modified, START);
        assert_eq!(first.synced_at, None);

        clock.advance(10);
        sync.cache_document("d1", json!({"v": 2})).await.unwrap();

        let cached = sync.get_cached_document("d1").await.unwrap().unwrap();
        assert_eq!(cached.content, json!({"v": 2}));
        assert_eq!(cached.last_modified, START + 10);
        assert_eq!(cached.synced_at, None);
    }

    #[tokio::test]
    async fn cache_document_while_connected_counts_as_synced() {
        let (sync, _clock) = service();
        sync.set_connection_status(ConnectionStatus::Connected);

        let cached = sync.cache_document("d1", json!([])).await.unwrap();
        assert_eq!(cached.synced_at, Some(START));
        assert!(cached.is_synced());
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let (sync, _clock) = service();
        assert!(sync.get_cached_document("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_document_id_is_rejected_before_any_write() {
        let (sync, _clock) = service();
        let error = sync.cache_document("  ", json!({})).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(sync.store().is_empty(crate::db::Collection::Documents));
    }

    #[tokio::test]
    async fn clear_document_cache_removes_everything_for_that_document_only() {
        let (sync, _clock) = service();
        sync.cache_document("d1", json!({"a": 1})).await.unwrap();
        sync.cache_document("d2", json!({"b": 1})).await.unwrap();
        sync.queue_change(NewChange::content("d1", "u1", json!({"op": 1})))
            .await
            .unwrap();
        sync.queue_change(NewChange::content("d2", "u1", json!({"op": 2})))
            .await
            .unwrap();
        sync.detect_conflict("d1", &json!({"a": 1}), &json!({"a": 2}))
            .await
            .unwrap();

        let removed = sync.clear_document_cache("d1").await.unwrap();
        assert_eq!(removed, 3);

        assert!(sync.get_cached_document("d1").await.unwrap().is_none());
        assert!(sync.get_queued_changes("d1").await.unwrap().is_empty());
        assert!(sync.unresolved_conflict("d1").await.unwrap().is_none());

        assert!(sync.get_cached_document("d2").await.unwrap().is_some());
        assert_eq!(sync.get_queued_changes("d2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_document_cache_keeps_resolved_conflicts() {
        let (sync, _clock) = service();
        let conflict = sync
            .detect_conflict("d1", &json!(1), &json!(2))
            .await
            .unwrap()
            .unwrap();
        sync.resolve_conflict(&conflict.id, json!(2)).await.unwrap();

        sync.clear_document_cache("d1").await.unwrap();

        let history = sync.list_conflicts("d1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].resolved);
    }

    #[tokio::test]
    async fn modified_since_and_unsynced_listings() {
        let (sync, clock) = service();
        sync.cache_document("old", json!(1)).await.unwrap();
        clock.advance(100);
        sync.cache_document("new", json!(2)).await.unwrap();
        assert!(sync.mark_synced("old", START + 200).await.unwrap());

        let recent = sync.documents_modified_since(START + 50).await.unwrap();
        assert_eq!(
            recent.iter().map(|d| d.document_id.as_str()).collect::<Vec<_>>(),
            vec!["new"]
        );

        let unsynced = sync.unsynced_documents().await.unwrap();
        assert_eq!(
            unsynced.iter().map(|d| d.document_id.as_str()).collect::<Vec<_>>(),
            vec!["new"]
        );
    }

    #[tokio::test]
    async fn mark_synced_ignores_unknown_documents() {
        let (sync, _clock) = service();
        assert!(!sync.mark_synced("ghost", START).await.unwrap());
        let store: &MemoryStore = sync.store();
        assert!(store.is_empty(crate::db::Collection::Documents));
    }

    #[tokio::test]
    async fn mark_synced_skips_content_written_after_the_stamp() {
        let (sync, clock) = service();
        clock.advance(10);
        sync.cache_document("d1", json!("late")).await.unwrap();

        assert!(!sync.mark_synced("d1", START + 10).await.unwrap());
        assert!(!sync.mark_synced("d1", START).await.unwrap());
        let cached = sync.get_cached_document("d1").await.unwrap().unwrap();
        assert_eq!(cached.synced_at, None);

        assert!(sync.mark_synced("d1", START + 11).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_cache_and_mark_synced_keep_latest_content() {
        let (sync, clock) = yielding_service();
        sync.cache_document("d1", json!("v1")).await.unwrap();
        clock.advance(5);

        let (cached, marked) = tokio::join!(
            sync.cache_document("d1", json!("v2")),
            sync.mark_synced("d1", START + 5)
        );
        cached.unwrap();
        marked.unwrap();

        let stored = sync.get_cached_document("d1").await.unwrap().unwrap();
        assert_eq!(stored.content, json!("v2"));
        assert!(!stored.is_synced());
    }
}

//! Conflict detection and resolution

use serde_json::Value;

use super::OfflineSync;
use crate::db::{Collection, IndexLookup, KeyValueStore, StoredRecord};
use crate::error::{Error, Result};
use crate::events::CollabEvent;
use crate::models::{CachedDocument, ConflictId, SyncConflict};
use crate::util::require_identifier;

impl<S: KeyValueStore> OfflineSync<S> {
    /// Compare local and remote content and record a conflict when they differ.
    ///
    /// Equal content yields `None`. A document has at most one unresolved
    /// conflict; if one exists it is returned unchanged.
    pub async fn detect_conflict(
        &self,
        document_id: &str,
        local_content: &Value,
        server_content: &Value,
    ) -> Result<Option<SyncConflict>> {
        let document_id = require_identifier(document_id, "document_id")?;
        if local_content == server_content {
            return Ok(None);
        }

        let _writes = self.writes.lock().await;
        if let Some(existing) = self.unresolved_conflict(&document_id).await? {
            tracing::debug!(
                "Document {document_id} already has unresolved conflict {}",
                existing.id
            );
            return Ok(Some(existing));
        }

        let conflict = SyncConflict {
            id: self.ids.conflict_id(),
            document_id,
            local_version: local_content.clone(),
            server_version: server_content.clone(),
            timestamp: self.clock.now_millis(),
            resolved: false,
            resolved_at: None,
        };
        self.write_conflict(&conflict).await?;

        tracing::info!(
            "Detected conflict {} on document {}",
            conflict.id,
            conflict.document_id
        );
        self.events.publish(CollabEvent::ConflictDetected {
            conflict_id: conflict.id,
            document_id: conflict.document_id.clone(),
        });
        Ok(Some(conflict))
    }

    /// Settle a conflict with `resolved_content`, which becomes the cached document.
    pub async fn resolve_conflict(
        &self,
        conflict_id: &ConflictId,
        resolved_content: Value,
    ) -> Result<CachedDocument> {
        let _writes = self.writes.lock().await;
        let mut conflict = self
            .get_conflict(conflict_id)
            .await?
            .ok_or_else(|| Error::ConflictNotFound(conflict_id.to_string()))?;
        if conflict.resolved {
            return Err(Error::ConflictAlreadyResolved(conflict_id.to_string()));
        }

        // Content first: if marking fails the conflict stays open and can be retried
        let document = self
            .store_content(conflict.document_id.clone(), resolved_content)
            .await?;

        conflict.resolved = true;
        conflict.resolved_at = Some(self.clock.now_millis());
        self.write_conflict(&conflict).await?;

        tracing::info!(
            "Resolved conflict {conflict_id} on document {}",
            conflict.document_id
        );
        self.events.publish(CollabEvent::ConflictResolved {
            conflict_id: conflict.id,
            document_id: conflict.document_id,
        });
        Ok(document)
    }

    pub async fn get_conflict(&self, conflict_id: &ConflictId) -> Result<Option<SyncConflict>> {
        self.store
            .get(Collection::Conflicts, &conflict_id.as_str())
            .await?
            .map(|record| record.decode())
            .transpose()
    }

    /// The open conflict of a document, if any.
    pub async fn unresolved_conflict(&self, document_id: &str) -> Result<Option<SyncConflict>> {
        Ok(self
            .list_conflicts(document_id)
            .await?
            .into_iter()
            .find(|conflict| !conflict.resolved))
    }

    /// Every conflict recorded for a document, oldest first.
    pub async fn list_conflicts(&self, document_id: &str) -> Result<Vec<SyncConflict>> {
        let document_id = require_identifier(document_id, "document_id")?;
        self.store
            .find(Collection::Conflicts, IndexLookup::DocumentId(&document_id))
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }

    /// Unresolved conflicts across all documents, oldest first.
    pub async fn open_conflicts(&self) -> Result<Vec<SyncConflict>> {
        let conflicts = self
            .store
            .find(Collection::Conflicts, IndexLookup::ModifiedSince(i64::MIN))
            .await?
            .iter()
            .map(StoredRecord::decode::<SyncConflict>)
            .collect::<Result<Vec<_>>>()?;
        Ok(conflicts
            .into_iter()
            .filter(|conflict| !conflict.resolved)
            .collect())
    }

    async fn write_conflict(&self, conflict: &SyncConflict) -> Result<()> {
        let record = StoredRecord::encode(
            conflict.id.as_str(),
            &conflict.document_id,
            conflict.timestamp,
            conflict,
        )?;
        self.store.put(Collection::Conflicts, record).await
    }
}

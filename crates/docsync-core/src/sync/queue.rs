//! Change queue operations

use serde_json::Value;

use super::OfflineSync;
use crate::db::{Collection, IndexLookup, KeyValueStore, StoredRecord};
use crate::error::{Error, Result};
use crate::models::{ChangeType, CursorPosition, NewChange, PresenceStatus, QueuedChange};
use crate::util::require_identifier;

impl<S: KeyValueStore> OfflineSync<S> {
    /// Append a local edit to its document's queue.
    ///
    /// Assigns the change id and starts `retry_count` at zero. Only the local
    /// store is touched.
    pub async fn queue_change(&self, change: NewChange) -> Result<QueuedChange> {
        let document_id = require_identifier(&change.document_id, "document_id")?;
        let user_id = require_identifier(&change.user_id, "user_id")?;
        validate_change_data(change.change_type, &change.data)?;

        let _writes = self.writes.lock().await;
        if let Some(limit) = self.max_queued_changes {
            let queued = self
                .store
                .find(Collection::Changes, IndexLookup::DocumentId(&document_id))
                .await?
                .len();
            if queued >= limit {
                tracing::warn!("Change queue for {document_id} is full ({limit} changes)");
                return Err(Error::QueueFull { document_id, limit });
            }
        }

        let timestamp = change
            .timestamp
            .unwrap_or_else(|| self.clock.now_millis());
        let queued = QueuedChange {
            id: self.ids.change_id(&document_id, timestamp),
            document_id,
            user_id,
            change_type: change.change_type,
            data: change.data,
            timestamp,
            retry_count: 0,
        };

        let record =
            StoredRecord::encode(queued.id.as_str(), &queued.document_id, timestamp, &queued)?;
        self.store.put(Collection::Changes, record).await?;
        tracing::debug!(
            document_id = %queued.document_id,
            change_id = %queued.id,
            "Queued change"
        );
        Ok(queued)
    }

    /// Queued changes for a document, oldest first.
    pub async fn get_queued_changes(&self, document_id: &str) -> Result<Vec<QueuedChange>> {
        let document_id = require_identifier(document_id, "document_id")?;
        self.store
            .find(Collection::Changes, IndexLookup::DocumentId(&document_id))
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }

    /// Every queued change across all documents, oldest edit first.
    pub async fn pending_changes(&self) -> Result<Vec<QueuedChange>> {
        self.store
            .find(Collection::Changes, IndexLookup::ModifiedSince(i64::MIN))
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }

    /// Drop every queued change of a document, returning how many were removed.
    pub async fn clear_queued_changes(&self, document_id: &str) -> Result<u64> {
        let document_id = require_identifier(document_id, "document_id")?;
        let _writes = self.writes.lock().await;
        let batch = self
            .store
            .find(Collection::Changes, IndexLookup::DocumentId(&document_id))
            .await?
            .into_iter()
            .map(|record| (Collection::Changes, record.key))
            .collect::<Vec<_>>();

        let removed = self.store.delete_batch(&batch).await?;
        tracing::info!("Cleared {removed} queued changes for {document_id}");
        Ok(removed)
    }
}

/// Reject payloads whose shape does not match the change type
fn validate_change_data(change_type: ChangeType, data: &Value) -> Result<()> {
    match change_type {
        ChangeType::Content if data.is_null() => Err(Error::InvalidInput(
            "content change data must not be null".to_string(),
        )),
        ChangeType::Content => Ok(()),
        ChangeType::Cursor => serde_json::from_value::<CursorPosition>(data.clone())
            .map(|_| ())
            .map_err(|error| Error::InvalidInput(format!("invalid cursor change data: {error}"))),
        ChangeType::Presence => serde_json::from_value::<PresenceStatus>(data.clone())
            .map(|_| ())
            .map_err(|error| {
                Error::InvalidInput(format!("invalid presence change data: {error}"))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{service, yielding_service, START};
    use super::*;
    use crate::config::CoreConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn queue_assigns_identity_and_zero_retries() {
        let (sync, _clock) = service();
        let queued = sync
            .queue_change(NewChange::content("d1", "u1", json!({"insert": "a"})))
            .await
            .unwrap();

        assert_eq!(queued.retry_count, 0);
        assert_eq!(queued.timestamp, START);
        assert!(queued.id.as_str().starts_with(&format!("d1-{START}-")));
    }

    #[tokio::test]
    async fn queue_keeps_insertion_order_under_same_timestamp() {
        let (sync, _clock) = service();
        let mut expected = Vec::new();
        for n in 0..5 {
            let queued = sync
                .queue_change(NewChange::content("d1", "u1", json!({ "n": n })))
                .await
                .unwrap();
            expected.push(queued.id);
        }

        let ids = sync
            .get_queued_changes("d1")
            .await
            .unwrap()
            .into_iter()
            .map(|change| change.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn caller_timestamp_is_preserved() {
        let (sync, _clock) = service();
        let queued = sync
            .queue_change(NewChange::content("d1", "u1", json!(1)).with_timestamp(42))
            .await
            .unwrap();
        assert_eq!(queued.timestamp, 42);
    }

    #[tokio::test]
    async fn malformed_payloads_are_rejected() {
        let (sync, _clock) = service();

        let null_content = sync
            .queue_change(NewChange::content("d1", "u1", Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(null_content, Error::InvalidInput(_)));

        let bad_cursor = sync
            .queue_change(NewChange::new("d1", "u1", ChangeType::Cursor, json!({"x": 1})))
            .await
            .unwrap_err();
        assert!(bad_cursor.to_string().contains("cursor"));

        let bad_presence = sync
            .queue_change(NewChange::new("d1", "u1", ChangeType::Presence, json!("asleep")))
            .await
            .unwrap_err();
        assert!(bad_presence.to_string().contains("presence"));

        let blank_user = sync
            .queue_change(NewChange::content("d1", " ", json!(1)))
            .await
            .unwrap_err();
        assert!(blank_user.to_string().contains("user_id"));

        assert!(sync.get_queued_changes("d1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cursor_and_presence_payloads_are_accepted() {
        let (sync, _clock) = service();
        sync.queue_change(NewChange::new(
            "d1",
            "u1",
            ChangeType::Cursor,
            json!({"anchor": 1, "head": 3}),
        ))
        .await
        .unwrap();
        sync.queue_change(NewChange::new("d1", "u1", ChangeType::Presence, json!("idle")))
            .await
            .unwrap();
        assert_eq!(sync.get_queued_changes("d1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn full_queue_rejects_instead_of_evicting() {
        let (sync, _clock) = service();
        let sync = sync
            .with_config(&CoreConfig::default().with_max_queued_changes(2))
            .unwrap();

        sync.queue_change(NewChange::content("d1", "u1", json!(1)))
            .await
            .unwrap();
        sync.queue_change(NewChange::content("d1", "u1", json!(2)))
            .await
            .unwrap();
        let error = sync
            .queue_change(NewChange::content("d1", "u1", json!(3)))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::QueueFull { limit: 2, .. }));

        // Other documents have their own budget
        sync.queue_change(NewChange::content("d2", "u1", json!(1)))
            .await
            .unwrap();

        let kept = sync.get_queued_changes("d1").await.unwrap();
        assert_eq!(
            kept.iter().map(|c| c.data.clone()).collect::<Vec<_>>(),
            vec![json!(1), json!(2)]
        );
    }

    #[tokio::test]
    async fn concurrent_queueing_respects_the_cap() {
        let (sync, _clock) = yielding_service();
        let sync = sync
            .with_config(&CoreConfig::default().with_max_queued_changes(1))
            .unwrap();

        let (a, b) = tokio::join!(
            sync.queue_change(NewChange::content("d1", "u1", json!("a"))),
            sync.queue_change(NewChange::content("d1", "u2", json!("b")))
        );
        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        assert!(matches!(
            a.err().or(b.err()),
            Some(Error::QueueFull { limit: 1, .. })
        ));
        assert_eq!(sync.get_queued_changes("d1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pending_changes_span_documents_in_edit_order() {
        let (sync, _clock) = service();
        sync.queue_change(NewChange::content("d2", "u1", json!(2)).with_timestamp(20))
            .await
            .unwrap();
        sync.queue_change(NewChange::content("d1", "u1", json!(1)).with_timestamp(10))
            .await
            .unwrap();

        let pending = sync.pending_changes().await.unwrap();
        assert_eq!(
            pending.iter().map(|c| c.document_id.as_str()).collect::<Vec<_>>(),
            vec!["d1", "d2"]
        );
    }

    #[tokio::test]
    async fn clear_queued_changes_is_scoped_to_document() {
        let (sync, _clock) = service();
        sync.queue_change(NewChange::content("d1", "u1", json!(1)))
            .await
            .unwrap();
        sync.queue_change(NewChange::content("d2", "u1", json!(1)))
            .await
            .unwrap();

        assert_eq!(sync.clear_queued_changes("d1").await.unwrap(), 1);
        assert!(sync.get_queued_changes("d1").await.unwrap().is_empty());
        assert_eq!(sync.get_queued_changes("d2").await.unwrap().len(), 1);
        assert_eq!(sync.clear_queued_changes("d1").await.unwrap(), 0);
    }
}

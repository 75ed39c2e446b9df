//! Push a document's queued changes through a caller-supplied remote call.

use std::fmt::Display;
use std::future::Future;

use serde::{Deserialize, Serialize};

use super::{ConnectionMonitor, OfflineSync};
use crate::db::{Collection, KeyValueStore};
use crate::error::Result;
use crate::models::{QueuedChange, SyncConflict};
use crate::state::ConnectionStatus;
use crate::util::{compact_text, require_identifier};

/// What the remote reported for a batch of changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSyncResult {
    pub success: bool,
    #[serde(default)]
    pub conflicts: Vec<SyncConflict>,
}

impl RemoteSyncResult {
    /// The remote took every change.
    pub const fn accepted() -> Self {
        Self {
            success: true,
            conflicts: Vec::new(),
        }
    }

    /// The remote refused the batch.
    pub const fn rejected() -> Self {
        Self {
            success: false,
            conflicts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_conflicts(mut self, conflicts: Vec<SyncConflict>) -> Self {
        self.conflicts = conflicts;
        self
    }
}

/// Result of one [`OfflineSync::sync_changes`] attempt
///
/// A failed remote call is an outcome, not an `Err`: the queue is kept and
/// `error` carries the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub conflicts: Vec<SyncConflict>,
    pub error: Option<String>,
    /// Number of changes the remote acknowledged
    pub synced_changes: usize,
}

impl SyncOutcome {
    fn succeeded(conflicts: Vec<SyncConflict>, synced_changes: usize) -> Self {
        Self {
            success: true,
            conflicts,
            error: None,
            synced_changes,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            conflicts: Vec::new(),
            error: Some(error.into()),
            synced_changes: 0,
        }
    }
}

/// Status bookkeeping for one attempt; falls back to disconnected if the
/// attempt ends without reporting, e.g. when its future is dropped.
struct Attempt<'a> {
    monitor: &'a ConnectionMonitor,
    finished: bool,
}

impl<'a> Attempt<'a> {
    fn start(monitor: &'a ConnectionMonitor) -> Self {
        monitor.set(ConnectionStatus::Syncing);
        Self {
            monitor,
            finished: false,
        }
    }

    fn finish(mut self, status: ConnectionStatus) {
        self.finished = true;
        self.monitor.set(status);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.monitor.set(ConnectionStatus::Disconnected);
        }
    }
}

impl<S: KeyValueStore> OfflineSync<S> {
    /// Send the queued changes of `document_id` to the remote via `sync_fn`.
    ///
    /// Only one sync per document runs at a time; a second call fails with
    /// [`crate::Error::SyncInProgress`] right away. On success exactly the
    /// changes handed to `sync_fn` are removed, so edits queued while the
    /// remote call was in flight stay queued, and the cached document is only
    /// marked synced if its content predates the call. On failure nothing is
    /// removed.
    pub async fn sync_changes<F, Fut, E>(&self, document_id: &str, sync_fn: F) -> Result<SyncOutcome>
    where
        F: FnOnce(Vec<QueuedChange>) -> Fut,
        Fut: Future<Output = std::result::Result<RemoteSyncResult, E>>,
        E: Display,
    {
        let document_id = require_identifier(document_id, "document_id")?;
        let _guard = self.locks.try_acquire(&document_id).inspect_err(|_| {
            tracing::warn!("Sync already running for {document_id}, rejecting");
        })?;
        let attempt = Attempt::start(&self.monitor);

        let changes = self.get_queued_changes(&document_id).await?;
        if changes.is_empty() {
            tracing::debug!("Nothing queued for {document_id}");
            attempt.finish(ConnectionStatus::Connected);
            return Ok(SyncOutcome::succeeded(Vec::new(), 0));
        }

        let sent = changes
            .iter()
            .map(|change| (Collection::Changes, change.id.to_string()))
            .collect::<Vec<_>>();
        tracing::info!("Syncing {} queued changes for {document_id}", sent.len());

        let started_at = self.clock.now_millis();
        match sync_fn(changes).await {
            Ok(result) if result.success => {
                self.store.delete_batch(&sent).await?;
                self.mark_synced(&document_id, started_at).await?;
                attempt.finish(ConnectionStatus::Connected);

                if !result.conflicts.is_empty() {
                    tracing::warn!(
                        "Remote reported {} conflicts for {document_id}",
                        result.conflicts.len()
                    );
                }
                tracing::info!("Synced {} changes for {document_id}", sent.len());
                Ok(SyncOutcome::succeeded(result.conflicts, sent.len()))
            }
            Ok(_) => {
                attempt.finish(ConnectionStatus::Disconnected);
                tracing::warn!("Remote rejected queued changes for {document_id}");
                Ok(SyncOutcome::failed("Remote rejected the queued changes"))
            }
            Err(error) => {
                attempt.finish(ConnectionStatus::Disconnected);
                let message = compact_text(&error.to_string());
                tracing::warn!("Sync failed for {document_id}: {message}");
                Ok(SyncOutcome::failed(message))
            }
        }
    }
}

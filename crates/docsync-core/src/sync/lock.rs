//! Per-document sync locks.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

/// Set of documents with a sync currently running
#[derive(Debug, Clone, Default)]
pub struct SyncLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the lock for `document_id` without waiting.
    ///
    /// Fails with [`Error::SyncInProgress`] when another sync holds it. The
    /// lock is released when the returned guard is dropped.
    pub fn try_acquire(&self, document_id: &str) -> Result<SyncGuard> {
        if !self.held().insert(document_id.to_string()) {
            return Err(Error::SyncInProgress(document_id.to_string()));
        }
        Ok(SyncGuard {
            locks: self.clone(),
            document_id: document_id.to_string(),
        })
    }

    pub fn is_locked(&self, document_id: &str) -> bool {
        self.held().contains(document_id)
    }
}

/// Holds one document's sync lock until dropped
#[derive(Debug)]
pub struct SyncGuard {
    locks: SyncLocks,
    document_id: String,
}

impl SyncGuard {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.locks.held().remove(&self.document_id);
        tracing::trace!("Released sync lock for {}", self.document_id);
    }
}

//! Connection status holder with a listener registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::state::ConnectionStatus;

/// Callback invoked with the new status after every transition.
pub type StatusListener = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

struct MonitorInner {
    status: RwLock<ConnectionStatus>,
    listeners: RwLock<HashMap<u64, StatusListener>>,
    next_id: AtomicU64,
}

/// Current [`ConnectionStatus`] of one service instance plus its observers
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                status: RwLock::new(ConnectionStatus::default()),
                listeners: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self
            .inner
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `status`, notifying listeners if it changed.
    ///
    /// Returns the previous status.
    pub fn set(&self, status: ConnectionStatus) -> ConnectionStatus {
        let previous = {
            let mut current = self
                .inner
                .status
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, status)
        };

        if previous != status {
            tracing::debug!("Connection status {previous} -> {status}");
            self.notify(status);
        }
        previous
    }

    /// Register a listener; it stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe(&self, listener: StatusListener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, listener);
        Subscription {
            id,
            monitor: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn notify(&self, status: ConnectionStatus) {
        // Snapshot so listeners may subscribe or unsubscribe while being called
        let listeners = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect::<Vec<_>>();

        for listener in listeners {
            // One failing listener must not starve the others
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(status);
            }));
            if outcome.is_err() {
                tracing::warn!("Connection status listener panicked");
            }
        }
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionMonitor")
            .field("status", &self.status())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

/// Handle for a registered status listener
pub struct Subscription {
    id: u64,
    monitor: Weak<MonitorInner>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.monitor.upgrade() {
            inner
                .listeners
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}

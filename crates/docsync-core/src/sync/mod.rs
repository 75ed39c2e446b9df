//! Offline document cache, change queue, sync engine, and conflict tracking.
//!
//! [`OfflineSync`] is an explicitly constructed service: callers hand it the
//! store, clock, and id generator, so several independent instances (one per
//! open workspace, say) never share state by accident.

mod cache;
mod conflict;
mod engine;
mod lock;
mod queue;
mod status;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::clock::{Clock, IdGenerator, RandomIdGenerator, SystemClock};
use crate::config::CoreConfig;
use crate::db::KeyValueStore;
use crate::error::Result;
use crate::events::EventBus;
use crate::state::ConnectionStatus;

pub use engine::{RemoteSyncResult, SyncOutcome};
pub use lock::{SyncGuard, SyncLocks};
pub use status::{ConnectionMonitor, StatusListener, Subscription};

/// Offline sync service over a [`KeyValueStore`]
pub struct OfflineSync<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    monitor: ConnectionMonitor,
    locks: SyncLocks,
    events: EventBus,
    max_queued_changes: Option<usize>,
    /// Serializes read-then-write sequences on the store
    writes: Mutex<()>,
}

impl<S: KeyValueStore> OfflineSync<S> {
    /// Create a service with the system clock, random ids, and default config.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIdGenerator),
            monitor: ConnectionMonitor::new(),
            locks: SyncLocks::new(),
            events: EventBus::default(),
            max_queued_changes: None,
            writes: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Publish conflict events on a shared bus
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Apply a validated config.
    ///
    /// Replaces the event bus with one sized by `event_capacity`; call
    /// [`Self::with_events`] afterwards to share a bus instead.
    pub fn with_config(mut self, config: &CoreConfig) -> Result<Self> {
        config.validate()?;
        self.max_queued_changes = config.max_queued_changes;
        self.events = EventBus::new(config.event_capacity);
        Ok(self)
    }

    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.monitor.status()
    }

    /// Set the status directly, e.g. when the transport reports it lost the network.
    pub fn set_connection_status(&self, status: ConnectionStatus) {
        self.monitor.set(status);
    }

    /// Record that the network came back but no sync has run yet.
    pub fn mark_reconnecting(&self) {
        self.monitor.set(ConnectionStatus::Reconnecting);
    }

    /// Observe status transitions until the subscription is dropped.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn on_connection_status_change(&self, listener: StatusListener) -> Subscription {
        self.monitor.subscribe(listener)
    }

    /// Whether a sync is currently running for `document_id`.
    pub fn is_syncing(&self, document_id: &str) -> bool {
        self.locks.is_locked(document_id)
    }
}

impl<S> std::fmt::Debug for OfflineSync<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineSync")
            .field("status", &self.monitor.status())
            .field("max_queued_changes", &self.max_queued_changes)
            .finish_non_exhaustive()
    }
}

//! Outbound domain events.
//!
//! The core never talks to a transport. Committed state changes are published
//! on a tokio broadcast channel; a transport adapter subscribes and forwards
//! them to other clients.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::DEFAULT_EVENT_CAPACITY;
use crate::models::{ConflictId, CursorPosition, PresenceStatus, SessionId};

/// A committed change other clients may need to hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollabEvent {
    SessionJoined {
        session_id: SessionId,
        document_id: String,
        user_id: String,
        user_color: String,
    },
    SessionLeft {
        session_id: SessionId,
        document_id: String,
        user_id: String,
    },
    CursorMoved {
        session_id: SessionId,
        document_id: String,
        user_id: String,
        position: CursorPosition,
    },
    PresenceChanged {
        session_id: SessionId,
        document_id: String,
        user_id: String,
        presence: PresenceStatus,
    },
    ConflictDetected {
        conflict_id: ConflictId,
        document_id: String,
    },
    ConflictResolved {
        conflict_id: ConflictId,
        document_id: String,
    },
}

impl CollabEvent {
    pub fn document_id(&self) -> &str {
        match self {
            Self::SessionJoined { document_id, .. }
            | Self::SessionLeft { document_id, .. }
            | Self::CursorMoved { document_id, .. }
            | Self::PresenceChanged { document_id, .. }
            | Self::ConflictDetected { document_id, .. }
            | Self::ConflictResolved { document_id, .. } => document_id,
        }
    }
}

/// Fan-out port for [`CollabEvent`]s
///
/// Cloning shares the channel. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CollabEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollabEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it.
    pub fn publish(&self, event: CollabEvent) -> usize {
        tracing::debug!(document_id = event.document_id(), ?event, "Publishing event");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

//! Data models for docsync

mod change;
mod document;
mod session;
mod sync_conflict;

pub use change::{ChangeId, ChangeType, NewChange, QueuedChange};
pub use document::CachedDocument;
pub use session::{
    ActiveUser, CollaborationSession, CursorPosition, JoinedSession, PresenceStatus, SessionId,
};
pub use sync_conflict::{ConflictId, SyncConflict};

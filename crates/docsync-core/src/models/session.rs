//! Collaboration session model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a collaboration session, using UUID v7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Presence of a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Active,
    Idle,
    Away,
}

impl PresenceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Away => "away",
        }
    }
}

/// Caret and selection anchor as character offsets into the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorPosition {
    pub anchor: u64,
    pub head: u64,
}

impl CursorPosition {
    /// Collapsed cursor without a selection.
    pub const fn caret(offset: u64) -> Self {
        Self {
            anchor: offset,
            head: offset,
        }
    }

    pub const fn has_selection(&self) -> bool {
        self.anchor != self.head
    }
}

/// One user viewing or editing one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationSession {
    pub id: SessionId,
    pub document_id: String,
    pub user_id: String,
    /// Palette color (`#RRGGBB`)
    pub user_color: String,
    pub cursor_position: Option<CursorPosition>,
    pub presence_status: PresenceStatus,
    /// Last join, cursor, or presence update (Unix ms)
    pub last_activity: i64,
    /// First join (Unix ms)
    pub joined_at: i64,
}

impl CollaborationSession {
    /// Whether the session was active within `window_ms` of `now`.
    pub const fn is_live(&self, now: i64, window_ms: i64) -> bool {
        now.saturating_sub(self.last_activity) <= window_ms
    }

    /// Project into the externally visible form.
    #[must_use]
    pub fn into_active_user(self, user_name: String) -> ActiveUser {
        ActiveUser {
            user_id: self.user_id,
            user_name,
            user_color: self.user_color,
            cursor_position: self.cursor_position,
            presence_status: self.presence_status,
            last_activity: self.last_activity,
            joined_at: self.joined_at,
        }
    }
}

/// Externally visible collaborator, with display name and without the session id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUser {
    pub user_id: String,
    pub user_name: String,
    pub user_color: String,
    pub cursor_position: Option<CursorPosition>,
    pub presence_status: PresenceStatus,
    pub last_activity: i64,
    pub joined_at: i64,
}

/// Session returned to the joining user, with their resolved display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedSession {
    #[serde(flatten)]
    pub session: CollaborationSession,
    pub user_name: String,
}

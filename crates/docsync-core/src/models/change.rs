//! Queued change model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a queued change: `<document>-<timestamp>-<random>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ChangeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of local edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Content,
    Cursor,
    Presence,
}

impl ChangeType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Cursor => "cursor",
            Self::Presence => "presence",
        }
    }
}

/// A change as submitted by the editor, before it is queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChange {
    pub document_id: String,
    pub user_id: String,
    pub change_type: ChangeType,
    pub data: Value,
    /// Edit time (Unix ms); the service clock is used when absent
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl NewChange {
    #[must_use]
    pub fn new(
        document_id: impl Into<String>,
        user_id: impl Into<String>,
        change_type: ChangeType,
        data: Value,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            user_id: user_id.into(),
            change_type,
            data,
            timestamp: None,
        }
    }

    /// Convenience constructor for a content edit.
    #[must_use]
    pub fn content(document_id: impl Into<String>, user_id: impl Into<String>, data: Value) -> Self {
        Self::new(document_id, user_id, ChangeType::Content, data)
    }

    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A local edit waiting to be acknowledged by the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedChange {
    pub id: ChangeId,
    pub document_id: String,
    pub user_id: String,
    pub change_type: ChangeType,
    pub data: Value,
    /// Edit time (Unix ms)
    pub timestamp: i64,
    pub retry_count: u32,
}

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docsync_core::collab::{AllowAll, UserIdAsName};
use docsync_core::models::{CachedDocument, CollaborationSession, QueuedChange, SyncConflict};
use docsync_core::{CoreConfig, LibSqlStore, OfflineSync, SessionManager};
use serde::Serialize;

use crate::error::CliError;

/// Environment variable overriding the default database location
pub const DB_PATH_ENV: &str = "DOCSYNC_DB_PATH";

const PREVIEW_CHARS: usize = 60;

/// Store and services shared by every command of one invocation
pub struct CliContext {
    db_path: PathBuf,
    config: CoreConfig,
    store: Arc<LibSqlStore>,
}

impl CliContext {
    pub fn new(db_path: PathBuf, config: CoreConfig) -> Self {
        let store = Arc::new(LibSqlStore::at_path(&db_path));
        Self {
            db_path,
            config,
            store,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn liveness_window_millis(&self) -> i64 {
        self.config.liveness_window_millis()
    }

    pub fn offline_sync(&self) -> Result<OfflineSync<LibSqlStore>, CliError> {
        Ok(OfflineSync::new(Arc::clone(&self.store)).with_config(&self.config)?)
    }

    pub fn sessions(&self) -> Result<SessionManager<LibSqlStore, AllowAll, UserIdAsName>, CliError> {
        Ok(SessionManager::new(
            Arc::clone(&self.store),
            AllowAll,
            UserIdAsName,
            &self.config,
        )?)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("docsync").join("docsync.db"))
        .ok_or_else(|| {
            CliError::Config(format!(
                "Failed to resolve data directory; pass --db-path or set {DB_PATH_ENV}"
            ))
        })
}

/// Load the JSON config file, or defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<CoreConfig, CliError> {
    let Some(path) = path else {
        return Ok(CoreConfig::default());
    };
    let payload = std::fs::read_to_string(path).map_err(|error| {
        CliError::Config(format!("Failed to read {}: {error}", path.display()))
    })?;
    Ok(CoreConfig::from_json(&payload)?)
}

#[derive(Debug, Serialize)]
pub struct DocumentListItem {
    pub document_id: String,
    pub last_modified: i64,
    pub last_modified_iso: String,
    pub synced_at: Option<i64>,
    pub synced: bool,
    pub preview: String,
}

#[derive(Debug, Serialize)]
pub struct ChangeListItem {
    pub id: String,
    pub user_id: String,
    pub change_type: String,
    pub timestamp: i64,
    pub timestamp_iso: String,
    pub retry_count: u32,
    pub preview: String,
}

#[derive(Debug, Serialize)]
pub struct ConflictListItem {
    pub id: String,
    pub document_id: String,
    pub detected_at: i64,
    pub detected_at_iso: String,
    pub resolved: bool,
    pub resolved_at: Option<i64>,
}

pub fn document_to_list_item(document: &CachedDocument) -> DocumentListItem {
    DocumentListItem {
        document_id: document.document_id.clone(),
        last_modified: document.last_modified,
        last_modified_iso: format_timestamp(document.last_modified),
        synced_at: document.synced_at,
        synced: document.is_synced(),
        preview: json_preview(&document.content, PREVIEW_CHARS),
    }
}

pub fn change_to_list_item(change: &QueuedChange) -> ChangeListItem {
    ChangeListItem {
        id: change.id.to_string(),
        user_id: change.user_id.clone(),
        change_type: change.change_type.as_str().to_string(),
        timestamp: change.timestamp,
        timestamp_iso: format_timestamp(change.timestamp),
        retry_count: change.retry_count,
        preview: json_preview(&change.data, PREVIEW_CHARS),
    }
}

pub fn conflict_to_list_item(conflict: &SyncConflict) -> ConflictListItem {
    ConflictListItem {
        id: conflict.id.to_string(),
        document_id: conflict.document_id.clone(),
        detected_at: conflict.timestamp,
        detected_at_iso: format_timestamp(conflict.timestamp),
        resolved: conflict.resolved,
        resolved_at: conflict.resolved_at,
    }
}

pub fn format_document_lines(documents: &[CachedDocument], now_ms: i64) -> Vec<String> {
    documents
        .iter()
        .map(|document| {
            let state = if document.is_synced() { "synced" } else { "pending" };
            format!(
                "{:<24}  {:<8}  {:>10}  {}",
                document.document_id,
                state,
                format_relative_time(document.last_modified, now_ms),
                json_preview(&document.content, PREVIEW_CHARS)
            )
        })
        .collect()
}

pub fn format_change_lines(changes: &[QueuedChange]) -> Vec<String> {
    changes
        .iter()
        .map(|change| {
            format!(
                "{}  {:<8}  user={}  retries={}  {}",
                format_timestamp(change.timestamp),
                change.change_type.as_str(),
                change.user_id,
                change.retry_count,
                json_preview(&change.data, PREVIEW_CHARS)
            )
        })
        .collect()
}

pub fn format_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            let state = conflict.resolved_at.map_or_else(
                || "open".to_string(),
                |resolved_at| format!("resolved {}", format_timestamp(resolved_at)),
            );
            format!(
                "{}  {}  detected {}",
                conflict.id,
                state,
                format_timestamp(conflict.timestamp)
            )
        })
        .collect()
}

pub fn format_session_lines(
    sessions: &[CollaborationSession],
    now_ms: i64,
    liveness_window_ms: i64,
) -> Vec<String> {
    sessions
        .iter()
        .map(|session| {
            let liveness = if session.is_live(now_ms, liveness_window_ms) {
                "live"
            } else {
                "stale"
            };
            format!(
                "{}  {:<16}  {}  {:<5}  {:<6}  active {}",
                session.id,
                session.user_id,
                session.user_color,
                liveness,
                session.presence_status.as_str(),
                format_relative_time(session.last_activity, now_ms)
            )
        })
        .collect()
}

/// Compact single-line JSON, truncated with an ellipsis.
pub fn json_preview(value: &serde_json::Value, max_chars: usize) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= max_chars {
        return rendered;
    }
    let truncated = rendered
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    format!("{truncated}...")
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

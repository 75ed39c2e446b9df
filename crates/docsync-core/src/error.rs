//! Error types for docsync-core

use thiserror::Error;

/// Result type alias using docsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in docsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The offline store could not be opened; every later call fails the same way
    #[error("Offline storage unavailable: {0}")]
    StorageUnavailable(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Caller lacks the role required on a document
    #[error("Insufficient permission for user {user_id} on document {document_id}")]
    InsufficientPermission {
        document_id: String,
        user_id: String,
    },

    /// Conflict id is unknown
    #[error("Conflict not found: {0}")]
    ConflictNotFound(String),

    /// Conflict was already resolved
    #[error("Conflict already resolved: {0}")]
    ConflictAlreadyResolved(String),

    /// Session id is unknown or belongs to another user
    #[error("Session not found or access denied: {0}")]
    SessionNotFound(String),

    /// Another sync is running for the same document
    #[error("Sync already in progress for document {0}")]
    SyncInProgress(String),

    /// Per-document queue reached its configured cap
    #[error("Change queue for document {document_id} is full ({limit} changes)")]
    QueueFull { document_id: String, limit: usize },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] docsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Document not cached: {0}")]
    DocumentNotFound(String),
    #[error("Invalid conflict ID: {0}")]
    InvalidConflictId(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

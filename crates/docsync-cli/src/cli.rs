use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "docsync")]
#[command(about = "Inspect and maintain the offline document store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional JSON config file (palette, liveness window, queue cap)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize cached documents, queued changes, and open conflicts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or drop cached documents
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Inspect or drop queued changes
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Inspect and resolve sync conflicts
    Conflicts {
        #[command(subcommand)]
        command: ConflictCommands,
    },
    /// Inspect collaboration sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print one cached document
    Show {
        /// Document ID
        document_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached documents
    List {
        /// Only documents modified at or after this Unix ms timestamp
        #[arg(long, value_name = "MS")]
        since: Option<i64>,
        /// Only documents not confirmed by a sync
        #[arg(long)]
        unsynced: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a document with its queued changes and open conflicts
    Clear {
        /// Document ID
        document_id: String,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List queued changes, oldest first
    List {
        /// Document ID
        document_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop every queued change of a document
    Clear {
        /// Document ID
        document_id: String,
    },
}

#[derive(Subcommand)]
pub enum ConflictCommands {
    /// List conflicts recorded for a document
    List {
        /// Document ID
        document_id: String,
        /// Only unresolved conflicts
        #[arg(long)]
        unresolved: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a conflict with chosen content
    Resolve {
        /// Conflict ID
        conflict_id: String,
        /// File holding the resolved JSON content
        #[arg(long, value_name = "PATH", conflicts_with = "take", required_unless_present = "take")]
        content_file: Option<PathBuf>,
        /// Keep one side of the conflict as-is
        #[arg(long, value_enum)]
        take: Option<ConflictSide>,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List every session record on a document, stale ones included
    List {
        /// Document ID
        document_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete sessions outside the liveness window
    Prune {
        /// Document ID
        document_id: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ConflictSide {
    Local,
    Server,
}

//! docsync-core - Offline sync and collaboration core for shared documents
//!
//! This crate contains the models, persistent offline store, change queue,
//! sync engine, conflict tracking, and collaboration sessions used by every
//! docsync front end. The remote server and the real-time transport stay
//! outside: callers pass in a sync function and subscribe to the
//! [`events::EventBus`].

pub mod clock;
pub mod collab;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod state;
pub mod sync;
pub mod util;

pub use collab::{DisplayNameResolver, PermissionChecker, Role, SessionManager};
pub use config::CoreConfig;
pub use db::{KeyValueStore, LibSqlStore, MemoryStore};
pub use error::{Error, Result};
pub use events::{CollabEvent, EventBus};
pub use state::ConnectionStatus;
pub use sync::{OfflineSync, RemoteSyncResult, SyncOutcome};

//! Persistent key/value layer for docsync
//!
//! Every record lives in a named [`Collection`] under a primary key and carries
//! two indexed fields: the owning document id and a timestamp. Bodies are JSON.

mod connection;
mod memory;
mod migrations;
mod store;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub use connection::Database;
pub use memory::MemoryStore;
pub use store::{LibSqlStore, StoreLocation};

/// Named collections of the offline store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Cached documents, keyed by document id, timestamp = last modified
    Documents,
    /// Queued changes, keyed by change id, timestamp = edit time
    Changes,
    /// Sync conflicts, keyed by conflict id, timestamp = detection time
    Conflicts,
    /// Collaboration sessions, keyed by session id, timestamp = last activity
    Sessions,
}

impl Collection {
    pub const ALL: [Self; 4] = [
        Self::Documents,
        Self::Changes,
        Self::Conflicts,
        Self::Sessions,
    ];

    /// Backing table name.
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Changes => "changes",
            Self::Conflicts => "conflicts",
            Self::Sessions => "collaboration_sessions",
        }
    }
}

/// Secondary-index lookups supported by every store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLookup<'a> {
    /// Records owned by a document, in insertion order
    DocumentId(&'a str),
    /// Records with `timestamp >= since`, oldest first
    ModifiedSince(i64),
}

/// A raw stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub key: String,
    pub document_id: String,
    pub timestamp: i64,
    /// JSON-encoded value
    pub body: String,
}

impl StoredRecord {
    /// Serialize `value` into a record with the given index fields.
    pub fn encode<T: Serialize>(
        key: impl Into<String>,
        document_id: impl Into<String>,
        timestamp: i64,
        value: &T,
    ) -> Result<Self> {
        Ok(Self {
            key: key.into(),
            document_id: document_id.into(),
            timestamp,
            body: serde_json::to_string(value)?,
        })
    }

    /// Deserialize the record body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Async key/value storage with secondary lookups (async)
///
/// Implementations serialize their own operations. `put` is an upsert that
/// keeps a record's original insertion position; `delete_batch` is atomic.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Insert or replace a record
    async fn put(&self, collection: Collection, record: StoredRecord) -> Result<()>;

    /// Get a record by primary key
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<StoredRecord>>;

    /// Look records up by a secondary index
    async fn find(
        &self,
        collection: Collection,
        lookup: IndexLookup<'_>,
    ) -> Result<Vec<StoredRecord>>;

    /// Delete a record, returning whether it existed
    async fn delete(&self, collection: Collection, key: &str) -> Result<bool>;

    /// Delete records across collections in one atomic step, returning the number removed
    async fn delete_batch(&self, batch: &[(Collection, String)]) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_round_trips_body() {
        let record = StoredRecord::encode("k", "d1", 7, &json!({"a": [1, 2]})).unwrap();
        assert_eq!(record.timestamp, 7);
        let value: serde_json::Value = record.decode().unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn table_names_are_distinct() {
        let names = Collection::ALL.map(Collection::table_name);
        let unique = names.iter().collect::<std::collections::HashSet<_>>();
        assert_eq!(unique.len(), names.len());
    }
}

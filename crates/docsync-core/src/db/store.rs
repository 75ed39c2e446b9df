//! libSQL-backed key/value store

use std::path::PathBuf;

use libsql::{params, Connection};
use tokio::sync::{Mutex, MutexGuard, OnceCell};

use super::{Collection, Database, IndexLookup, KeyValueStore, StoredRecord};
use crate::error::{Error, Result};

/// Where a [`LibSqlStore`] keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Path(PathBuf),
    InMemory,
}

/// Lazily opened libSQL store
///
/// The database is opened and migrated by the first operation. A failed open
/// is remembered: every later operation returns [`Error::StorageUnavailable`]
/// with the original cause instead of trying again.
pub struct LibSqlStore {
    location: StoreLocation,
    handle: OnceCell<std::result::Result<Mutex<Database>, String>>,
}

impl LibSqlStore {
    /// Store backed by a database file, created on first use
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::new(StoreLocation::Path(path.into()))
    }

    /// Store backed by a private in-memory database
    pub fn in_memory() -> Self {
        Self::new(StoreLocation::InMemory)
    }

    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            handle: OnceCell::new(),
        }
    }

    pub const fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Whether the first open has been attempted and succeeded
    pub fn is_open(&self) -> bool {
        matches!(self.handle.get(), Some(Ok(_)))
    }

    /// Open the database if needed and lock it for one operation
    async fn database(&self) -> Result<MutexGuard<'_, Database>> {
        let opened = self
            .handle
            .get_or_init(|| async {
                let result = match &self.location {
                    StoreLocation::Path(path) => Database::open(path).await,
                    StoreLocation::InMemory => Database::open_in_memory().await,
                };
                result.map(Mutex::new).map_err(|error| {
                    tracing::error!("Failed to open offline store: {error}");
                    error.to_string()
                })
            })
            .await;

        match opened {
            Ok(database) => Ok(database.lock().await),
            Err(message) => Err(Error::StorageUnavailable(message.clone())),
        }
    }

    /// Parse a database row into a record
    fn parse_record(row: &libsql::Row) -> Result<StoredRecord> {
        Ok(StoredRecord {
            key: row.get(0)?,
            document_id: row.get(1)?,
            timestamp: row.get(2)?,
            body: row.get(3)?,
        })
    }

    async fn collect_records(
        conn: &Connection,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<StoredRecord>> {
        let mut rows = conn.query(sql, params).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_record(&row)?);
        }
        Ok(records)
    }
}

impl KeyValueStore for LibSqlStore {
    async fn put(&self, collection: Collection, record: StoredRecord) -> Result<()> {
        let db = self.database().await?;
        let sql = format!(
            "INSERT INTO {} (key, document_id, timestamp, body) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                document_id = excluded.document_id,
                timestamp = excluded.timestamp,
                body = excluded.body",
            collection.table_name()
        );
        db.connection()
            .execute(
                &sql,
                params![
                    record.key.as_str(),
                    record.document_id.as_str(),
                    record.timestamp,
                    record.body.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<StoredRecord>> {
        let db = self.database().await?;
        let sql = format!(
            "SELECT key, document_id, timestamp, body FROM {} WHERE key = ?1",
            collection.table_name()
        );
        let mut rows = db.connection().query(&sql, [key]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn find(
        &self,
        collection: Collection,
        lookup: IndexLookup<'_>,
    ) -> Result<Vec<StoredRecord>> {
        let db = self.database().await?;
        let table = collection.table_name();
        match lookup {
            IndexLookup::DocumentId(document_id) => {
                let sql = format!(
                    "SELECT key, document_id, timestamp, body FROM {table}
                     WHERE document_id = ?1
                     ORDER BY seq ASC"
                );
                Self::collect_records(db.connection(), &sql, [document_id]).await
            }
            IndexLookup::ModifiedSince(since) => {
                let sql = format!(
                    "SELECT key, document_id, timestamp, body FROM {table}
                     WHERE timestamp >= ?1
                     ORDER BY timestamp ASC, seq ASC"
                );
                Self::collect_records(db.connection(), &sql, [since]).await
            }
        }
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool> {
        let db = self.database().await?;
        let sql = format!("DELETE FROM {} WHERE key = ?1", collection.table_name());
        let rows = db.connection().execute(&sql, [key]).await?;
        Ok(rows > 0)
    }

    async fn delete_batch(&self, batch: &[(Collection, String)]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let db = self.database().await?;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;

        let mut removed = 0;
        for (collection, key) in batch {
            let sql = format!("DELETE FROM {} WHERE key = ?1", collection.table_name());
            match conn.execute(&sql, [key.as_str()]).await {
                Ok(rows) => removed += rows,
                Err(e) => {
                    conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(removed)
    }
}

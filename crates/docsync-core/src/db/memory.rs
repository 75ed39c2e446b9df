//! In-process key/value store

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Collection, IndexLookup, KeyValueStore, StoredRecord};
use crate::error::Result;

/// Volatile store with the same ordering and atomicity rules as [`super::LibSqlStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Collection, MemoryTable>>,
}

#[derive(Debug, Default)]
struct MemoryTable {
    next_seq: u64,
    rows: BTreeMap<u64, StoredRecord>,
    keys: HashMap<String, u64>,
}

impl MemoryTable {
    fn upsert(&mut self, record: StoredRecord) {
        if let Some(seq) = self.keys.get(&record.key) {
            self.rows.insert(*seq, record);
            return;
        }
        self.next_seq += 1;
        self.keys.insert(record.key.clone(), self.next_seq);
        self.rows.insert(self.next_seq, record);
    }

    fn remove(&mut self, key: &str) -> bool {
        self.keys
            .remove(key)
            .and_then(|seq| self.rows.remove(&seq))
            .is_some()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<Collection, MemoryTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of records held in a collection
    pub fn len(&self, collection: Collection) -> usize {
        self.tables()
            .get(&collection)
            .map_or(0, |table| table.rows.len())
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }
}

impl KeyValueStore for MemoryStore {
    async fn put(&self, collection: Collection, record: StoredRecord) -> Result<()> {
        self.tables().entry(collection).or_default().upsert(record);
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<StoredRecord>> {
        let tables = self.tables();
        Ok(tables.get(&collection).and_then(|table| {
            table
                .keys
                .get(key)
                .and_then(|seq| table.rows.get(seq))
                .cloned()
        }))
    }

    async fn find(
        &self,
        collection: Collection,
        lookup: IndexLookup<'_>,
    ) -> Result<Vec<StoredRecord>> {
        let tables = self.tables();
        let Some(table) = tables.get(&collection) else {
            return Ok(Vec::new());
        };

        let records = match lookup {
            IndexLookup::DocumentId(document_id) => table
                .rows
                .values()
                .filter(|record| record.document_id == document_id)
                .cloned()
                .collect(),
            IndexLookup::ModifiedSince(since) => {
                let mut records = table
                    .rows
                    .values()
                    .filter(|record| record.timestamp >= since)
                    .cloned()
                    .collect::<Vec<_>>();
                // Stable sort keeps insertion order for equal timestamps
                records.sort_by_key(|record| record.timestamp);
                records
            }
        };
        Ok(records)
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool> {
        Ok(self
            .tables()
            .get_mut(&collection)
            .is_some_and(|table| table.remove(key)))
    }

    async fn delete_batch(&self, batch: &[(Collection, String)]) -> Result<u64> {
        // One lock acquisition makes the batch atomic for other callers
        let mut tables = self.tables();
        let mut removed = 0;
        for (collection, key) in batch {
            if tables
                .get_mut(collection)
                .is_some_and(|table| table.remove(key))
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

//! # redb-backed Key-Value Store
//!
//! A disk-backed `KvStore` using the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Each mutating primitive runs in its own write transaction. redb admits
//! one writer at a time, which is what makes `incr` and `compare_and_set`
//! atomic across threads sharing the handle.

use super::KvStore;
use crate::VersalError;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for JSON values: key -> serialized value
const VALUES: TableDefinition<&str, &str> = TableDefinition::new("values");

/// Table for counters: key -> u64
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

fn storage_err(e: impl std::fmt::Display) -> VersalError {
    VersalError::Storage(e.to_string())
}

/// A disk-backed store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VersalError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(VALUES).map_err(storage_err)?;
            let _ = write_txn.open_table(COUNTERS).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        tracing::debug!(path = %path.as_ref().display(), "Opened redb store");
        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>, VersalError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(VALUES).map_err(storage_err)?;
        let value = table
            .get(key)
            .map_err(storage_err)?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VersalError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(VALUES).map_err(storage_err)?;
            table.insert(key, value).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, VersalError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let swapped = {
            let mut table = write_txn.open_table(VALUES).map_err(storage_err)?;
            let current = table
                .get(key)
                .map_err(storage_err)?
                .map(|v| v.value().to_string());
            if current.as_deref() == expected {
                table.insert(key, value).map_err(storage_err)?;
                true
            } else {
                false
            }
        };
        if swapped {
            write_txn.commit().map_err(storage_err)?;
        } else {
            write_txn.abort().map_err(storage_err)?;
        }
        Ok(swapped)
    }

    fn incr(&self, key: &str) -> Result<u64, VersalError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let next = {
            let mut table = write_txn.open_table(COUNTERS).map_err(storage_err)?;
            let current = table
                .get(key)
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            let next = current.saturating_add(1);
            table.insert(key, next).map_err(storage_err)?;
            next
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(next)
    }

    fn delete(&self, key: &str) -> Result<(), VersalError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut values = write_txn.open_table(VALUES).map_err(storage_err)?;
            values.remove(key).map_err(storage_err)?;
            let mut counters = write_txn.open_table(COUNTERS).map_err(storage_err)?;
            counters.remove(key).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! In-memory `KvStore`.
//!
//! Volatile; contents vanish with the process.

use super::KvStore;
use crate::VersalError;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    values: BTreeMap<String, String>,
    counters: BTreeMap<String, u64>,
}

/// Mutex-guarded maps implementing [`KvStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, VersalError> {
        self.tables
            .lock()
            .map_err(|_| VersalError::Storage("memory store lock poisoned".to_string()))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, VersalError> {
        Ok(self.lock()?.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VersalError> {
        self.lock()?
            .values
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, VersalError> {
        let mut tables = self.lock()?;
        if tables.values.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        tables.values.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn incr(&self, key: &str) -> Result<u64, VersalError> {
        let mut tables = self.lock()?;
        let counter = tables.counters.entry(key.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
        Ok(*counter)
    }

    fn delete(&self, key: &str) -> Result<(), VersalError> {
        let mut tables = self.lock()?;
        tables.values.remove(key);
        tables.counters.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incr_starts_at_one() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("c").expect("incr"), 1);
        assert_eq!(store.incr("c").expect("incr"), 2);
        assert_eq!(store.incr("c").expect("incr"), 3);
    }

    #[test]
    fn compare_and_set_checks_current_value() {
        let store = MemoryStore::new();
        assert!(store.compare_and_set("k", None, "a").expect("cas"));
        assert!(!store.compare_and_set("k", None, "b").expect("cas"));
        assert!(!store.compare_and_set("k", Some("x"), "b").expect("cas"));
        assert!(store.compare_and_set("k", Some("a"), "b").expect("cas"));
        assert_eq!(store.get("k").expect("get").as_deref(), Some("b"));
    }

    #[test]
    fn delete_clears_value_and_counter() {
        let store = MemoryStore::new();
        store.set("k", "v").expect("set");
        store.incr("k").expect("incr");
        store.delete("k").expect("delete");
        assert_eq!(store.get("k").expect("get"), None);
        // The counter restarts from zero.
        assert_eq!(store.incr("k").expect("incr"), 1);
    }
}

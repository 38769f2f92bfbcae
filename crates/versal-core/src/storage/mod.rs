//! # Storage Module
//!
//! Key-value primitives the game state adapter is built on.
//!
//! The adapter never holds a lock across its read/compute/commit steps.
//! Instead every backend must make two primitives atomic:
//! - `incr`: atomically increment an integer counter and return the new value
//! - `compare_and_set`: replace a value only if it still equals what was read
//!
//! ## Backends
//!
//! - `MemoryStore`: mutex-guarded maps (tests, `--backend memory`)
//! - `RedbStore`: redb embedded database (ACID, persistent)

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::VersalError;

/// Atomic key-value primitives required by the state adapter.
///
/// String values hold serialized JSON; counters live in a separate
/// integer namespace so a counter key never collides with a value key.
pub trait KvStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, VersalError>;

    /// Write a value unconditionally.
    fn set(&self, key: &str, value: &str) -> Result<(), VersalError>;

    /// Write `value` only if the current value equals `expected`
    /// (`None` meaning "absent"). Returns whether the write happened.
    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, VersalError>;

    /// Atomically increment a counter (absent counts as 0) and return
    /// the new value.
    fn incr(&self, key: &str) -> Result<u64, VersalError>;

    /// Remove a value and a counter stored under `key`, if present.
    fn delete(&self, key: &str) -> Result<(), VersalError>;
}

// ABOUTME: Key-value store abstraction underlying every table, index, and version entry.
// ABOUTME: Defines the KeyValueStore trait, its error type, and full-store snapshot support.

pub mod file;
pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Default capacity for every backend, matching the usual browser storage quota.
pub const DEFAULT_CAPACITY: usize = 5 * 1024 * 1024;

/// Errors that can occur inside a key-value backend.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("quota exceeded writing {key}: {needed} bytes needed, capacity is {capacity}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        capacity: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A full copy of every key and value in a store, in key order.
pub type StoreSnapshot = BTreeMap<String, String>;

/// A synchronous, string-keyed storage medium with a capacity limit.
///
/// Writes that would push the total stored size (key bytes plus value
/// bytes) past the capacity fail with [`KvError::QuotaExceeded`] and leave
/// the store unchanged.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), KvError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), KvError>;

    fn keys(&self) -> Result<Vec<String>, KvError>;

    fn contains_key(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.get(key)?.is_some())
    }

    /// Copy the entire store.
    fn snapshot(&self) -> Result<StoreSnapshot, KvError> {
        let mut snapshot = StoreSnapshot::new();
        for key in self.keys()? {
            if let Some(value) = self.get(&key)? {
                snapshot.insert(key, value);
            }
        }
        Ok(snapshot)
    }

    /// Replace the entire store with a previously taken snapshot.
    /// Keys absent from the snapshot are removed.
    fn restore(&mut self, snapshot: &StoreSnapshot) -> Result<(), KvError> {
        for key in self.keys()? {
            if !snapshot.contains_key(&key) {
                self.remove(&key)?;
            }
        }
        for (key, value) in snapshot {
            self.set(key, value)?;
        }
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), KvError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), KvError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, KvError> {
        (**self).keys()
    }

    fn contains_key(&self, key: &str) -> Result<bool, KvError> {
        (**self).contains_key(key)
    }

    fn snapshot(&self) -> Result<StoreSnapshot, KvError> {
        (**self).snapshot()
    }

    fn restore(&mut self, snapshot: &StoreSnapshot) -> Result<(), KvError> {
        (**self).restore(snapshot)
    }
}

/// Byte footprint of one entry as counted against a store's capacity.
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Check that replacing `key`'s current value (of `old_size` bytes, 0 when
/// absent) with `value` keeps `used` within `capacity`.
pub(crate) fn check_quota(
    key: &str,
    value: &str,
    used: usize,
    old_size: usize,
    capacity: usize,
) -> Result<(), KvError> {
    let needed = used - old_size + entry_size(key, value);
    if needed > capacity {
        return Err(KvError::QuotaExceeded {
            key: key.to_string(),
            needed,
            capacity,
        });
    }
    Ok(())
}

// ABOUTME: In-memory key-value backend with a byte quota, used for tests and ephemeral sessions.
// ABOUTME: Tracks the running size of all entries so quota checks are constant time.

use std::collections::BTreeMap;

use super::{DEFAULT_CAPACITY, KeyValueStore, KvError, StoreSnapshot, check_quota, entry_size};

/// A capacity-bounded store that lives only as long as the process.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    used: usize,
    capacity: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            used: 0,
            capacity,
        }
    }

    /// Bytes currently counted against the quota.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), KvError> {
        let old_size = self
            .entries
            .get(key)
            .map(|old| entry_size(key, old))
            .unwrap_or(0);
        check_quota(key, value, self.used, old_size, self.capacity)?;

        self.used = self.used - old_size + entry_size(key, value);
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), KvError> {
        if let Some(old) = self.entries.remove(key) {
            self.used -= entry_size(key, &old);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, KvError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn contains_key(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.entries.contains_key(key))
    }

    fn snapshot(&self) -> Result<StoreSnapshot, KvError> {
        Ok(self.entries.clone())
    }

    fn restore(&mut self, snapshot: &StoreSnapshot) -> Result<(), KvError> {
        self.used = snapshot.iter().map(|(k, v)| entry_size(k, v)).sum();
        self.entries = snapshot.clone();
        Ok(())
    }
}

// ABOUTME: File-backed key-value store persisting the whole map as a single JSON document.
// ABOUTME: Every mutation rewrites the file atomically (temp file, fsync, rename).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::memory::MemoryStore;
use super::{DEFAULT_CAPACITY, KeyValueStore, KvError, StoreSnapshot};

/// A durable store kept in memory and mirrored to one JSON file on disk.
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open (or create) a store at the given path with the default capacity.
    pub fn open(path: &Path) -> Result<Self, KvError> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY)
    }

    /// Open (or create) a store at the given path.
    /// A missing file is an empty store; the file is written on first mutation.
    pub fn open_with_capacity(path: &Path, capacity: usize) -> Result<Self, KvError> {
        let mut inner = MemoryStore::with_capacity(capacity);

        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let entries: StoreSnapshot = serde_json::from_str(&contents)?;
            inner.restore(&entries)?;
            tracing::debug!(
                "opened file store {} with {} keys",
                path.display(),
                entries.len()
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    /// Returns the path to the backing JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), KvError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(&self.inner.snapshot()?)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut file = File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;

        // Best-effort: the rename already succeeded, so the data is consistent.
        if let Some(parent) = self.path.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }

        Ok(())
    }

    /// Run a mutation against the in-memory map and persist it, undoing the
    /// mutation if the file could not be written.
    fn mutate<F>(&mut self, op: F) -> Result<(), KvError>
    where
        F: FnOnce(&mut MemoryStore) -> Result<(), KvError>,
    {
        let before = self.inner.clone();
        op(&mut self.inner)?;
        if let Err(e) = self.flush() {
            self.inner = before;
            return Err(e);
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), KvError> {
        self.mutate(|inner| inner.set(key, value))
    }

    fn remove(&mut self, key: &str) -> Result<(), KvError> {
        if !self.inner.contains_key(key)? {
            return Ok(());
        }
        self.mutate(|inner| inner.remove(key))
    }

    fn keys(&self) -> Result<Vec<String>, KvError> {
        self.inner.keys()
    }

    fn contains_key(&self, key: &str) -> Result<bool, KvError> {
        self.inner.contains_key(key)
    }

    fn snapshot(&self) -> Result<StoreSnapshot, KvError> {
        self.inner.snapshot()
    }

    fn restore(&mut self, snapshot: &StoreSnapshot) -> Result<(), KvError> {
        self.mutate(|inner| inner.restore(snapshot))
    }
}

// ABOUTME: Whole-store backup: capture every registered table and the version into one JSON document.
// ABOUTME: Dumps are written atomically (temp file, fsync, rename) and can be restored into any backend.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{Table, read_table};
use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::persistence::Persistence;

/// Errors that can occur while writing or reading a dump.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Every registered table with its records, plus the recorded version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDump {
    pub version: Option<String>,
    pub tables: BTreeMap<String, Table>,
    pub saved_at: DateTime<Utc>,
}

impl<S: KeyValueStore> Persistence<S> {
    /// Capture every table listed in the master index.
    pub fn dump(&self) -> Result<StoreDump, StoreError> {
        let mut tables = BTreeMap::new();
        for name in self.tables()? {
            let table = read_table(self.store(), &name)?;
            tables.insert(name, table);
        }

        Ok(StoreDump {
            version: self.version()?,
            tables,
            saved_at: Utc::now(),
        })
    }

    /// Replace the store contents with the dump. Every dumped table is
    /// written and registered, registered tables missing from the dump are
    /// emptied, and the recorded version becomes the dump's (removed when
    /// the dump has none, so the next migration run treats it as legacy).
    pub fn restore_dump(&mut self, dump: &StoreDump) -> Result<(), StoreError> {
        for name in self.tables()? {
            if !dump.tables.contains_key(&name) {
                self.write(&name, &Table::new())?;
            }
        }
        for (name, table) in &dump.tables {
            self.register(name)?;
            self.write(name, table)?;
        }
        match &dump.version {
            Some(version) => self.set_version(version)?,
            None => self.clear_version()?,
        }
        tracing::info!(
            "restored {} tables from dump taken {}",
            dump.tables.len(),
            dump.saved_at
        );
        Ok(())
    }
}

/// Save a dump using atomic write (write to .tmp, fsync, rename).
/// Creates the parent directory if it does not exist.
pub fn save_dump(path: &Path, dump: &StoreDump) -> Result<(), DumpError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(dump)?;

    let mut file = File::create(&tmp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Load a dump previously written by [`save_dump`].
pub fn load_dump(path: &Path) -> Result<StoreDump, DumpError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

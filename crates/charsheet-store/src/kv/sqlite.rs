// ABOUTME: SQLite-backed key-value store holding every entry as one row of a kv table.
// ABOUTME: Enforces the byte quota with a size query before each write.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use super::{DEFAULT_CAPACITY, KeyValueStore, KvError, StoreSnapshot, check_quota, entry_size};

/// A key-value store persisted in a single SQLite table.
pub struct SqliteStore {
    conn: Connection,
    capacity: usize,
}

impl SqliteStore {
    /// Open or create a SQLite store at the given path with the default capacity.
    pub fn open(path: &Path) -> Result<Self, KvError> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY)
    }

    /// Open or create a SQLite store at the given path.
    pub fn open_with_capacity(path: &Path, capacity: usize) -> Result<Self, KvError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, capacity)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(capacity: usize) -> Result<Self, KvError> {
        Self::init(Connection::open_in_memory()?, capacity)
    }

    fn init(conn: Connection, capacity: usize) -> Result<Self, KvError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn, capacity })
    }

    /// Bytes currently counted against the quota.
    pub fn used(&self) -> Result<usize, KvError> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv",
            [],
            |row| row.get(0),
        )?;
        Ok(used as usize)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), KvError> {
        let old_size = self
            .get(key)?
            .map(|old| entry_size(key, &old))
            .unwrap_or(0);
        check_quota(key, value, self.used()?, old_size, self.capacity)?;

        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), KvError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, KvError> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    fn snapshot(&self) -> Result<StoreSnapshot, KvError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM kv")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = StoreSnapshot::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    fn restore(&mut self, snapshot: &StoreSnapshot) -> Result<(), KvError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM kv", [])?;
        for (key, value) in snapshot {
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

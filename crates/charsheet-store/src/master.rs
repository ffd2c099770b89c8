// ABOUTME: Master index listing every table that has been written, stored under a reserved key.
// ABOUTME: The index is the only enumeration of tables; the store itself is never scanned.

use crate::kv::{KeyValueStore, KvError};

/// Reserved key holding the master index.
pub const MASTER_KEY: &str = "__master__";

/// Reserved key holding the last applied application version.
pub const VERSION_KEY: &str = "__version__";

/// Whether a key is reserved for bookkeeping and may not name a table.
pub fn is_reserved(name: &str) -> bool {
    name == MASTER_KEY || name == VERSION_KEY
}

/// List registered table names in registration order.
pub fn list_tables<S: KeyValueStore + ?Sized>(store: &S) -> Result<Vec<String>, KvError> {
    let Some(raw) = store.get(MASTER_KEY)? else {
        return Ok(Vec::new());
    };

    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(tables) => Ok(tables),
        Err(e) => {
            tracing::warn!("master index is not parseable, treating as empty: {}", e);
            Ok(Vec::new())
        }
    }
}

/// Add a table to the index if it is not listed yet.
/// Returns true when the index was written.
pub fn ensure_registered<S: KeyValueStore + ?Sized>(
    store: &mut S,
    name: &str,
) -> Result<bool, KvError> {
    let mut tables = list_tables(store)?;
    if tables.iter().any(|t| t == name) {
        return Ok(false);
    }

    tables.push(name.to_string());
    store.set(MASTER_KEY, &serde_json::to_string(&tables)?)?;
    tracing::info!("registered table {}", name);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    #[test]
    fn empty_store_has_no_tables() {
        let store = MemoryStore::new();
        assert!(list_tables(&store).unwrap().is_empty());
    }

    #[test]
    fn registration_is_idempotent() {
        let mut store = MemoryStore::new();

        assert!(ensure_registered(&mut store, "Person").unwrap());
        assert!(!ensure_registered(&mut store, "Person").unwrap());
        assert!(ensure_registered(&mut store, "Encounter").unwrap());

        assert_eq!(
            list_tables(&store).unwrap(),
            vec!["Person".to_string(), "Encounter".to_string()]
        );
        assert_eq!(
            store.get(MASTER_KEY).unwrap().as_deref(),
            Some(r#"["Person","Encounter"]"#)
        );
    }

    #[test]
    fn corrupt_index_reads_empty_and_is_replaced() {
        let mut store = MemoryStore::new();
        store.set(MASTER_KEY, "{oops").unwrap();

        assert!(list_tables(&store).unwrap().is_empty());
        assert!(ensure_registered(&mut store, "Person").unwrap());
        assert_eq!(list_tables(&store).unwrap(), vec!["Person".to_string()]);
    }

    #[test]
    fn reserved_keys() {
        assert!(is_reserved(MASTER_KEY));
        assert!(is_reserved(VERSION_KEY));
        assert!(!is_reserved("Person"));
    }
}

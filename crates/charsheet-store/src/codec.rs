// ABOUTME: Table codec reading and writing a whole table as one JSON object under its name.
// ABOUTME: Missing or unparseable tables read as empty so first use and corruption never fail.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::kv::{KeyValueStore, KvError};

/// A table's records keyed by decimal identifier string.
pub type Table = BTreeMap<String, Value>;

/// Read a table. Absent keys and values that are not a JSON object yield an
/// empty table; only backend failures are returned as errors.
pub fn read_table<S: KeyValueStore + ?Sized>(store: &S, name: &str) -> Result<Table, KvError> {
    let Some(raw) = store.get(name)? else {
        return Ok(Table::new());
    };

    match serde_json::from_str::<Table>(&raw) {
        Ok(table) => Ok(table),
        Err(e) => {
            tracing::warn!("table {} is not parseable, treating as empty: {}", name, e);
            Ok(Table::new())
        }
    }
}

/// Serialize the full table and overwrite its key.
pub fn write_table<S: KeyValueStore + ?Sized>(
    store: &mut S,
    name: &str,
    table: &Table,
) -> Result<(), KvError> {
    let json = serde_json::to_string(table)?;
    store.set(name, &json)?;
    tracing::debug!("wrote table {} ({} records, {} bytes)", name, table.len(), json.len());
    Ok(())
}

/// Parse a record key as an identifier. Only canonical decimal keys (no
/// sign, no leading zeros) count, since lookups format ids with `to_string`.
pub fn parse_id(key: &str) -> Option<u64> {
    let id = key.parse::<u64>().ok()?;
    (id.to_string() == key).then_some(id)
}

/// The identifier the next inserted record receives: one more than the
/// largest id key, or 0 for a table with none. `None` when the largest id
/// is already `u64::MAX`.
pub fn next_id(table: &Table) -> Option<u64> {
    match table.keys().filter_map(|key| parse_id(key)).max() {
        Some(max) => max.checked_add(1),
        None => Some(0),
    }
}

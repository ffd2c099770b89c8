// ABOUTME: Error taxonomy for persistence operations, one variant per failure kind.
// ABOUTME: Callers match on StoreError to tell quota, lookup, adapter, and migration failures apart.

use thiserror::Error;

use crate::kv::KvError;
use crate::model::AdapterError;

/// Errors surfaced by the persistence core when `log_errors` is off.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("export failed for model {model}: {source}")]
    Export {
        model: String,
        #[source]
        source: AdapterError,
    },

    #[error("import failed for model {model}, record {id}: {source}")]
    Import {
        model: String,
        id: String,
        #[source]
        source: AdapterError,
    },

    #[error(
        "storage quota exceeded writing {key} ({needed} bytes needed, capacity {capacity}){}",
        compression_hint(.compression_enabled)
    )]
    QuotaExceeded {
        key: String,
        needed: usize,
        capacity: usize,
        compression_enabled: bool,
    },

    #[error("no record {} in table {table}", display_id(.id))]
    NotFound { table: String, id: Option<u64> },

    #[error("table {0} has no identifiers left to assign")]
    IdExhausted(String),

    #[error("migration to {version} failed and was rolled back: {reason}")]
    MigrationFailed { version: String, reason: String },

    #[error("table name {0} is reserved")]
    ReservedTable(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(KvError),
}

impl StoreError {
    /// Convert a backend error raised during a write, lifting quota
    /// failures into [`StoreError::QuotaExceeded`].
    pub(crate) fn from_write(err: KvError, compression_enabled: bool) -> Self {
        match err {
            KvError::QuotaExceeded {
                key,
                needed,
                capacity,
            } => StoreError::QuotaExceeded {
                key,
                needed,
                capacity,
                compression_enabled,
            },
            other => StoreError::Backend(other),
        }
    }
}

impl From<KvError> for StoreError {
    fn from(err: KvError) -> Self {
        StoreError::from_write(err, false)
    }
}

fn compression_hint(compression_enabled: &bool) -> &'static str {
    if *compression_enabled {
        "; data does not fit even with compression enabled"
    } else {
        "; consider enabling compression"
    }
}

fn display_id(id: &Option<u64>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => "(unsaved instance)".to_string(),
    }
}

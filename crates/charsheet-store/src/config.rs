// ABOUTME: Persistence configuration: behavior flags plus the storage backend to open.
// ABOUTME: Built explicitly with documented defaults or loaded from CHARSHEET_* environment variables.

use std::path::PathBuf;

use thiserror::Error;

use crate::kv::{DEFAULT_CAPACITY, FileStore, KeyValueStore, KvError, MemoryStore, SqliteStore};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CHARSHEET_BACKEND must be one of memory, file, sqlite; got {0}")]
    InvalidBackend(String),

    #[error("CHARSHEET_CAPACITY is not a byte count: {0}")]
    InvalidCapacity(String),
}

/// The storage medium behind a persistence core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory { capacity: usize },
    File { path: PathBuf, capacity: usize },
    Sqlite { path: PathBuf, capacity: usize },
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Memory {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Backend {
    /// Open the configured store.
    pub fn open(&self) -> Result<Box<dyn KeyValueStore>, KvError> {
        let store: Box<dyn KeyValueStore> = match self {
            Backend::Memory { capacity } => Box::new(MemoryStore::with_capacity(*capacity)),
            Backend::File { path, capacity } => {
                Box::new(FileStore::open_with_capacity(path, *capacity)?)
            }
            Backend::Sqlite { path, capacity } => {
                Box::new(SqliteStore::open_with_capacity(path, *capacity)?)
            }
        };
        Ok(store)
    }
}

/// Behavior of the persistence core.
///
/// Defaults: `custom_import` on, `log_errors` off, `enable_compression`
/// off, in-memory backend with a 5 MiB quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Use each model's export/import hooks. When off, instances are
    /// serialized structurally with serde and no import hook runs.
    pub custom_import: bool,
    /// Log failures and carry on instead of returning them.
    pub log_errors: bool,
    /// Only changes the wording of quota errors; nothing is compressed.
    pub enable_compression: bool,
    pub backend: Backend,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            custom_import: true,
            log_errors: false,
            enable_compression: false,
            backend: Backend::default(),
        }
    }
}

impl PersistenceConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - CHARSHEET_HOME: data directory (default: ~/.charsheet)
    /// - CHARSHEET_BACKEND: memory, file, or sqlite (default: file)
    /// - CHARSHEET_CAPACITY: storage quota in bytes (default: 5 MiB)
    /// - CHARSHEET_CUSTOM_IMPORT: use model hooks (default: true)
    /// - CHARSHEET_LOG_ERRORS: log instead of failing (default: false)
    /// - CHARSHEET_ENABLE_COMPRESSION: advisory compression flag (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = std::env::var("CHARSHEET_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp"))
                    .join(".charsheet")
            });

        let capacity = match std::env::var("CHARSHEET_CAPACITY") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidCapacity(raw))?,
            Err(_) => DEFAULT_CAPACITY,
        };

        let backend_name =
            std::env::var("CHARSHEET_BACKEND").unwrap_or_else(|_| "file".to_string());
        let backend = match backend_name.as_str() {
            "memory" => Backend::Memory { capacity },
            "file" => Backend::File {
                path: home.join("store.json"),
                capacity,
            },
            "sqlite" => Backend::Sqlite {
                path: home.join("store.db"),
                capacity,
            },
            _ => return Err(ConfigError::InvalidBackend(backend_name)),
        };

        Ok(Self {
            custom_import: env_flag("CHARSHEET_CUSTOM_IMPORT", true),
            log_errors: env_flag("CHARSHEET_LOG_ERRORS", false),
            enable_compression: env_flag("CHARSHEET_ENABLE_COMPRESSION", false),
            backend,
        })
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1" || v == "yes")
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 6] = [
        "CHARSHEET_HOME",
        "CHARSHEET_BACKEND",
        "CHARSHEET_CAPACITY",
        "CHARSHEET_CUSTOM_IMPORT",
        "CHARSHEET_LOG_ERRORS",
        "CHARSHEET_ENABLE_COMPRESSION",
    ];

    fn clear_env() {
        // SAFETY: test-only code; every test touching CHARSHEET_* runs inside one test fn
        unsafe {
            for var in VARS {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn defaults_match_documentation() {
        let config = PersistenceConfig::default();
        assert!(config.custom_import);
        assert!(!config.log_errors);
        assert!(!config.enable_compression);
        assert_eq!(
            config.backend,
            Backend::Memory {
                capacity: DEFAULT_CAPACITY
            }
        );
    }

    // Environment variables are process-global, so every env scenario lives
    // in this one test to avoid racing parallel tests.
    #[test]
    fn config_from_env() {
        clear_env();
        let config = PersistenceConfig::from_env().unwrap();
        assert!(config.custom_import);
        assert!(!config.log_errors);
        match &config.backend {
            Backend::File { path, capacity } => {
                assert!(path.to_string_lossy().contains(".charsheet"));
                assert_eq!(*capacity, DEFAULT_CAPACITY);
            }
            other => panic!("expected file backend, got {:?}", other),
        }

        // SAFETY: see clear_env
        unsafe {
            std::env::set_var("CHARSHEET_HOME", "/data/sheets");
            std::env::set_var("CHARSHEET_BACKEND", "sqlite");
            std::env::set_var("CHARSHEET_CAPACITY", "1024");
            std::env::set_var("CHARSHEET_LOG_ERRORS", "yes");
            std::env::set_var("CHARSHEET_CUSTOM_IMPORT", "0");
        }
        let config = PersistenceConfig::from_env().unwrap();
        assert!(config.log_errors);
        assert!(!config.custom_import);
        assert_eq!(
            config.backend,
            Backend::Sqlite {
                path: PathBuf::from("/data/sheets/store.db"),
                capacity: 1024
            }
        );

        // SAFETY: see clear_env
        unsafe {
            std::env::set_var("CHARSHEET_BACKEND", "cloud");
        }
        let err = PersistenceConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("cloud"), "{}", err);

        // SAFETY: see clear_env
        unsafe {
            std::env::set_var("CHARSHEET_BACKEND", "memory");
            std::env::set_var("CHARSHEET_CAPACITY", "lots");
        }
        let err = PersistenceConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity(_)));

        clear_env();
    }

    #[test]
    fn memory_backend_opens() {
        let mut store = Backend::default().open().unwrap();
        store.set("k", "v").unwrap();
        assert!(store.contains_key("k").unwrap());
    }
}

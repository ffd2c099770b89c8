// ABOUTME: Persistence layer for charsheet, mapping model instances onto a flat key-value store.
// ABOUTME: Provides storage backends, the table codec, master index, tokens, migrations, and dumps.

pub mod codec;
pub mod config;
pub mod dump;
pub mod error;
pub mod kv;
pub mod master;
pub mod migration;
pub mod model;
pub mod persistence;
pub mod token;

pub use codec::Table;
pub use config::{Backend, ConfigError, PersistenceConfig};
pub use dump::{DumpError, StoreDump, load_dump, save_dump};
pub use error::StoreError;
pub use kv::{FileStore, KeyValueStore, KvError, MemoryStore, SqliteStore};
pub use migration::{Migration, MigrationReport, should_apply_migration};
pub use model::{AdapterError, Identity, ModelDescriptor, Persisted};
pub use persistence::{Persistence, RawRecord};
pub use token::Token;

// ABOUTME: Persistence core mapping model instances onto tables in a key-value store.
// ABOUTME: Handles id assignment, master-index bookkeeping, lookups, deletes, drops, and the log-or-raise policy.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec::{Table, next_id, parse_id, read_table, write_table};
use crate::config::PersistenceConfig;
use crate::error::StoreError;
use crate::kv::{KeyValueStore, KvError};
use crate::master::{VERSION_KEY, ensure_registered, is_reserved, list_tables};
use crate::model::{AdapterError, ModelDescriptor, Persisted};
use crate::token::Token;

/// One stored record exactly as it sits in its table.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub data: Value,
}

/// Persists model instances as records in named tables.
pub struct Persistence<S> {
    store: S,
    config: PersistenceConfig,
}

impl Persistence<Box<dyn KeyValueStore>> {
    /// Open the backend named in the configuration.
    pub fn open(config: PersistenceConfig) -> Result<Self, StoreError> {
        let store = config.backend.open()?;
        Ok(Self::new(store, config))
    }
}

impl<S: KeyValueStore> Persistence<S> {
    /// Wrap an already opened store. The config's backend field is ignored.
    pub fn new(store: S, config: PersistenceConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Bind a model and one of its instances into a token.
    pub fn token<'a, T: Persisted>(
        &'a mut self,
        model: &'a ModelDescriptor<T>,
        instance: &'a mut T,
    ) -> Token<'a, S, T> {
        Token::new(self, model, instance)
    }

    /// Every record in a table, unprocessed, in key order.
    pub fn find_all_raw(&self, table: &str) -> Result<Vec<RawRecord>, StoreError> {
        let table = read_table(&self.store, table)?;
        Ok(table
            .into_iter()
            .map(|(id, data)| RawRecord { id, data })
            .collect())
    }

    /// Rebuild every instance stored for a model. Records that fail to
    /// import are skipped when `log_errors` is on.
    pub fn find_all<T>(&self, model: &ModelDescriptor<T>) -> Result<Vec<T>, StoreError>
    where
        T: Persisted + DeserializeOwned,
    {
        let records = self.find_all_raw(model.name())?;
        let mut instances = Vec::with_capacity(records.len());

        for record in &records {
            match self.materialize(model, record) {
                Ok(instance) => instances.push(instance),
                Err(e) => self.absorb(e)?,
            }
        }

        Ok(instances)
    }

    /// Rebuild a single instance by id.
    pub fn find<T>(&self, model: &ModelDescriptor<T>, id: u64) -> Result<Option<T>, StoreError>
    where
        T: Persisted + DeserializeOwned,
    {
        let mut table = read_table(&self.store, model.name())?;
        let Some(data) = table.remove(&id.to_string()) else {
            return Ok(None);
        };

        let record = RawRecord {
            id: id.to_string(),
            data,
        };
        match self.materialize(model, &record) {
            Ok(instance) => Ok(Some(instance)),
            Err(e) => self.absorb(e).map(|()| None),
        }
    }

    /// Rebuild the instances whose stored record has every given top-level
    /// field equal to the given value.
    pub fn find_by<T>(
        &self,
        model: &ModelDescriptor<T>,
        predicates: &[(&str, Value)],
    ) -> Result<Vec<T>, StoreError>
    where
        T: Persisted + DeserializeOwned,
    {
        let records = self.find_all_raw(model.name())?;
        let mut instances = Vec::new();

        for record in records.iter().filter(|r| matches_all(&r.data, predicates)) {
            match self.materialize(model, record) {
                Ok(instance) => instances.push(instance),
                Err(e) => self.absorb(e)?,
            }
        }

        Ok(instances)
    }

    /// Store an instance, assigning it the next free id on first save.
    /// Saving an instance that already has an id overwrites its record.
    pub fn save<T>(&mut self, model: &ModelDescriptor<T>, instance: &mut T) -> Result<(), StoreError>
    where
        T: Persisted + Serialize,
    {
        match self.try_save(model, instance) {
            Ok(()) => Ok(()),
            Err(e) => self.absorb(e),
        }
    }

    fn try_save<T>(&mut self, model: &ModelDescriptor<T>, instance: &mut T) -> Result<(), StoreError>
    where
        T: Persisted + Serialize,
    {
        let name = model.name();
        reject_reserved(name)?;

        let data = if self.config.custom_import {
            model.export(instance)
        } else {
            serde_json::to_value(&*instance).map_err(AdapterError::from)
        }
        .map_err(|source| StoreError::Export {
            model: name.to_string(),
            source,
        })?;

        let mut table = read_table(&self.store, name)?;
        let id = match instance.id() {
            Some(id) => id,
            None => {
                next_id(&table).ok_or_else(|| StoreError::IdExhausted(name.to_string()))?
            }
        };
        table.insert(id.to_string(), data);

        self.register(name)?;
        self.write(name, &table)?;

        if instance.identity_mut().assign(id) {
            tracing::debug!("assigned id {} in table {}", id, name);
        }
        Ok(())
    }

    /// Write an already serialized record, bypassing the model's export hook.
    pub fn save_obj(&mut self, table: &str, id: u64, raw: Value) -> Result<(), StoreError> {
        match self.try_save_obj(table, id, raw) {
            Ok(()) => Ok(()),
            Err(e) => self.absorb(e),
        }
    }

    fn try_save_obj(&mut self, table: &str, id: u64, raw: Value) -> Result<(), StoreError> {
        reject_reserved(table)?;
        let mut records = read_table(&self.store, table)?;
        records.insert(id.to_string(), raw);
        self.register(table)?;
        self.write(table, &records)
    }

    /// Overwrite a whole table with the given records in a single write and
    /// register it. Failures are always returned, whatever `log_errors`
    /// says, so a migration rebuilding a table can roll back.
    pub fn replace_table(&mut self, table: &str, records: &Table) -> Result<(), StoreError> {
        reject_reserved(table)?;
        self.register(table)?;
        self.write(table, records)?;
        tracing::debug!("replaced table {} with {} records", table, records.len());
        Ok(())
    }

    /// Remove one record. A missing id is [`StoreError::NotFound`] and
    /// leaves the table untouched.
    pub fn delete<T>(&mut self, model: &ModelDescriptor<T>, id: u64) -> Result<(), StoreError> {
        let name = model.name();
        let mut table = read_table(&self.store, name)?;

        if table.remove(&id.to_string()).is_none() {
            return self.absorb(StoreError::NotFound {
                table: name.to_string(),
                id: Some(id),
            });
        }

        match self.write(name, &table) {
            Ok(()) => {
                tracing::debug!("deleted record {} from table {}", id, name);
                Ok(())
            }
            Err(e) => self.absorb(e),
        }
    }

    /// Remove every record in a table. The table stays registered.
    pub fn drop(&mut self, table: &str) -> Result<(), StoreError> {
        if !self.store.contains_key(table)? {
            return Ok(());
        }
        match self.write(table, &Table::new()) {
            Ok(()) => {
                tracing::info!("dropped all records from table {}", table);
                Ok(())
            }
            Err(e) => self.absorb(e),
        }
    }

    /// Empty every registered table.
    pub fn drop_all(&mut self) -> Result<(), StoreError> {
        for table in self.tables()? {
            self.drop(&table)?;
        }
        Ok(())
    }

    /// Registered table names, in registration order.
    pub fn tables(&self) -> Result<Vec<String>, StoreError> {
        Ok(list_tables(&self.store)?)
    }

    /// Number of records in a table.
    pub fn count(&self, table: &str) -> Result<usize, StoreError> {
        Ok(read_table(&self.store, table)?.len())
    }

    /// The last applied application version, if one was ever recorded.
    pub fn version(&self) -> Result<Option<String>, StoreError> {
        Ok(self.store.get(VERSION_KEY)?)
    }

    pub(crate) fn set_version(&mut self, version: &str) -> Result<(), StoreError> {
        self.store
            .set(VERSION_KEY, version)
            .map_err(|e| self.write_error(e))
    }

    pub(crate) fn clear_version(&mut self) -> Result<(), StoreError> {
        Ok(self.store.remove(VERSION_KEY)?)
    }

    pub(crate) fn register(&mut self, table: &str) -> Result<(), StoreError> {
        ensure_registered(&mut self.store, table).map_err(|e| self.write_error(e))?;
        Ok(())
    }

    pub(crate) fn write(&mut self, table: &str, records: &Table) -> Result<(), StoreError> {
        write_table(&mut self.store, table, records).map_err(|e| self.write_error(e))
    }

    fn write_error(&self, err: KvError) -> StoreError {
        StoreError::from_write(err, self.config.enable_compression)
    }

    /// Apply the log-or-raise policy: with `log_errors` on the failure is
    /// logged and swallowed, otherwise it is returned.
    pub(crate) fn absorb(&self, err: StoreError) -> Result<(), StoreError> {
        if self.config.log_errors {
            tracing::error!("{}", err);
            Ok(())
        } else {
            Err(err)
        }
    }

    fn materialize<T>(&self, model: &ModelDescriptor<T>, record: &RawRecord) -> Result<T, StoreError>
    where
        T: Persisted + DeserializeOwned,
    {
        let import_error = |source| StoreError::Import {
            model: model.name().to_string(),
            id: record.id.clone(),
            source,
        };

        let id = parse_id(&record.id).ok_or_else(|| {
            import_error(AdapterError::InvalidField {
                field: "id".to_string(),
                reason: format!("{:?} is not a canonical decimal id", record.id),
            })
        })?;

        let mut instance = if self.config.custom_import {
            let mut instance = model.create();
            model
                .import(&mut instance, &record.data)
                .map_err(import_error)?;
            instance
        } else {
            serde_json::from_value::<T>(record.data.clone())
                .map_err(|e| import_error(AdapterError::Json(e)))?
        };

        instance.identity_mut().assign(id);
        Ok(instance)
    }
}

fn reject_reserved(table: &str) -> Result<(), StoreError> {
    if is_reserved(table) {
        return Err(StoreError::ReservedTable(table.to_string()));
    }
    Ok(())
}

fn matches_all(data: &Value, predicates: &[(&str, Value)]) -> bool {
    predicates
        .iter()
        .all(|(field, expected)| data.get(field) == Some(expected))
}

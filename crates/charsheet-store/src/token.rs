// ABOUTME: Token binding one model instance to the persistence core for the duration of an edit.
// ABOUTME: Forwards save, delete, and lookups so callers do not repeat the descriptor each time.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::model::{ModelDescriptor, Persisted};
use crate::persistence::Persistence;

/// A handle on one instance and the model it belongs to.
pub struct Token<'a, S, T> {
    db: &'a mut Persistence<S>,
    model: &'a ModelDescriptor<T>,
    instance: &'a mut T,
}

impl<'a, S: KeyValueStore, T: Persisted> Token<'a, S, T> {
    pub fn new(
        db: &'a mut Persistence<S>,
        model: &'a ModelDescriptor<T>,
        instance: &'a mut T,
    ) -> Self {
        Self {
            db,
            model,
            instance,
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.instance.id()
    }

    pub fn instance(&self) -> &T {
        &*self.instance
    }

    pub fn instance_mut(&mut self) -> &mut T {
        &mut *self.instance
    }

    pub fn save(&mut self) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        self.db.save(self.model, self.instance)
    }

    /// Delete the bound instance's record. An instance that was never
    /// saved has no record and reports [`StoreError::NotFound`].
    pub fn delete(&mut self) -> Result<(), StoreError> {
        match self.instance.id() {
            Some(id) => self.db.delete(self.model, id),
            None => self.db.absorb(StoreError::NotFound {
                table: self.model.name().to_string(),
                id: None,
            }),
        }
    }

    /// Every stored instance of the bound model.
    pub fn find_all(&self) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        self.db.find_all(self.model)
    }

    /// Re-read the bound instance's stored record.
    pub fn reload(&self) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        match self.instance.id() {
            Some(id) => self.db.find(self.model, id),
            None => Ok(None),
        }
    }
}

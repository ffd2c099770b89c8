// ABOUTME: Defines the Encounter model, a named scene on a character sheet.
// ABOUTME: Encounters carry optional description and notes and own points of interest.

use charsheet_store::model::optional_str;
use charsheet_store::{AdapterError, Identity, ModelDescriptor, Persisted};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Table holding encounters.
pub const ENCOUNTER_TABLE: &str = "Encounter";

/// A scene the party can run into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    #[serde(skip)]
    pub identity: Identity,
    pub name: String,
    pub description: Option<String>,
    pub notes: Option<String>,
}

impl Encounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn descriptor() -> ModelDescriptor<Encounter> {
        ModelDescriptor::new(ENCOUNTER_TABLE, Encounter::default, export, import)
    }
}

impl Persisted for Encounter {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

fn export(encounter: &Encounter) -> Result<Value, AdapterError> {
    if encounter.name.trim().is_empty() {
        return Err(AdapterError::InvalidField {
            field: "name".to_string(),
            reason: "must not be blank".to_string(),
        });
    }
    Ok(json!({
        "name": encounter.name,
        "description": encounter.description,
        "notes": encounter.notes,
    }))
}

// Older records stored the name under "title"
fn import(encounter: &mut Encounter, data: &Value) -> Result<(), AdapterError> {
    encounter.name = match optional_str(data, "name")? {
        Some(name) => name,
        None => optional_str(data, "title")?
            .ok_or_else(|| AdapterError::MissingField("name".to_string()))?,
    };
    encounter.description = optional_str(data, "description")?;
    encounter.notes = optional_str(data, "notes")?;
    Ok(())
}

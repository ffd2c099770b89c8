// ABOUTME: Defines the PointOfInterest model, a location or detail attached to an encounter.
// ABOUTME: Stored records reference their encounter by id under the encounterId field.

use charsheet_store::model::{optional_str, require_str};
use charsheet_store::{
    AdapterError, Identity, KeyValueStore, ModelDescriptor, Persistence, Persisted, StoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::encounter::Encounter;

/// Table holding points of interest.
pub const POINT_OF_INTEREST_TABLE: &str = "PointOfInterest";

/// Something notable within an encounter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointOfInterest {
    #[serde(skip)]
    pub identity: Identity,
    pub encounter_id: u64,
    pub name: String,
    pub description: Option<String>,
}

impl PointOfInterest {
    pub fn new(encounter_id: u64, name: impl Into<String>) -> Self {
        Self {
            encounter_id,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn descriptor() -> ModelDescriptor<PointOfInterest> {
        ModelDescriptor::new(
            POINT_OF_INTEREST_TABLE,
            PointOfInterest::default,
            export,
            import,
        )
    }

    /// Every point of interest attached to the given encounter. Matches on
    /// the imported `encounter_id`, so ids stored as strings are found too.
    pub fn for_encounter<S: KeyValueStore>(
        db: &Persistence<S>,
        encounter: &Encounter,
    ) -> Result<Vec<PointOfInterest>, StoreError> {
        let Some(encounter_id) = encounter.identity.get() else {
            return Ok(Vec::new());
        };
        Ok(db
            .find_all(&Self::descriptor())?
            .into_iter()
            .filter(|poi| poi.encounter_id == encounter_id)
            .collect())
    }
}

impl Persisted for PointOfInterest {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

fn export(poi: &PointOfInterest) -> Result<Value, AdapterError> {
    Ok(json!({
        "encounterId": poi.encounter_id,
        "name": poi.name,
        "description": poi.description,
    }))
}

fn import(poi: &mut PointOfInterest, data: &Value) -> Result<(), AdapterError> {
    poi.encounter_id = match data.get("encounterId") {
        None | Some(Value::Null) => {
            return Err(AdapterError::MissingField("encounterId".to_string()));
        }
        // Some stores hold the id as a decimal string, the way table keys are written
        Some(Value::String(s)) => s.parse().map_err(|_| AdapterError::InvalidField {
            field: "encounterId".to_string(),
            reason: format!("not an id: {}", s),
        })?,
        Some(other) => other.as_u64().ok_or_else(|| AdapterError::InvalidField {
            field: "encounterId".to_string(),
            reason: format!("not an id: {}", other),
        })?,
    };
    poi.name = require_str(data, "name")?.to_string();
    poi.description = optional_str(data, "description")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use charsheet_store::{MemoryStore, PersistenceConfig};

    #[test]
    fn export_import_round_trip() {
        let mut original = PointOfInterest::new(3, "Collapsed well");
        original.description = Some("Smells of sulfur".to_string());

        let model = PointOfInterest::descriptor();
        let data = model.export(&original).unwrap();
        assert_eq!(data["encounterId"], json!(3));

        let mut restored = model.create();
        model.import(&mut restored, &data).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn import_accepts_string_encounter_id() {
        let model = PointOfInterest::descriptor();
        let mut poi = model.create();
        model
            .import(&mut poi, &json!({"encounterId": "12", "name": "Gate"}))
            .unwrap();
        assert_eq!(poi.encounter_id, 12);
    }

    #[test]
    fn import_rejects_missing_or_bad_encounter() {
        let model = PointOfInterest::descriptor();
        let mut poi = model.create();

        let err = model
            .import(&mut poi, &json!({"name": "Gate"}))
            .unwrap_err();
        assert!(matches!(err, AdapterError::MissingField(_)));

        let err = model
            .import(&mut poi, &json!({"encounterId": -1, "name": "Gate"}))
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidField { .. }));
    }

    #[test]
    fn for_encounter_finds_string_and_numeric_owner_ids() {
        let mut db = Persistence::new(MemoryStore::new(), PersistenceConfig::default());
        let mut ambush = Encounter::new("Ambush");
        db.save(&Encounter::descriptor(), &mut ambush).unwrap();
        let mut brawl = Encounter::new("Brawl");
        db.save(&Encounter::descriptor(), &mut brawl).unwrap();

        db.save_obj(POINT_OF_INTEREST_TABLE, 0, json!({"encounterId": 0, "name": "Ridge"}))
            .unwrap();
        db.save_obj(POINT_OF_INTEREST_TABLE, 1, json!({"encounterId": "0", "name": "Bar"}))
            .unwrap();
        db.save_obj(POINT_OF_INTEREST_TABLE, 2, json!({"encounterId": 1, "name": "Stool"}))
            .unwrap();

        let names: Vec<String> = PointOfInterest::for_encounter(&db, &ambush)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Ridge".to_string(), "Bar".to_string()]);
        assert_eq!(PointOfInterest::for_encounter(&db, &brawl).unwrap().len(), 1);
    }

    #[test]
    fn unsaved_encounter_has_no_points_of_interest() {
        let mut db = Persistence::new(MemoryStore::new(), PersistenceConfig::default());
        db.save_obj(POINT_OF_INTEREST_TABLE, 0, json!({"encounterId": 0, "name": "Ridge"}))
            .unwrap();
        let draft = Encounter::new("Draft");
        assert!(PointOfInterest::for_encounter(&db, &draft).unwrap().is_empty());
    }

    #[test]
    fn structural_form_uses_wire_names() {
        let poi = PointOfInterest::new(1, "Altar");
        let value = serde_json::to_value(&poi).unwrap();
        assert_eq!(
            value,
            json!({"encounterId": 1, "name": "Altar", "description": null})
        );
    }
}

// ABOUTME: Built-in data migrations for charsheet stores, applied at startup in list order.
// ABOUTME: Each migration rewrites raw records so older stores match the current record shapes.

use charsheet_store::{KeyValueStore, Migration, Persistence, Table};
use serde_json::Value;

use crate::encounter::ENCOUNTER_TABLE;
use crate::point_of_interest::POINT_OF_INTEREST_TABLE;

/// The migrations every charsheet store goes through, oldest first.
pub fn builtin_migrations<S: KeyValueStore + 'static>() -> Vec<Migration<S>> {
    vec![
        Migration::new("0.1.0", rename_encounter_title),
        Migration::new("0.1.0", remove_orphaned_points_of_interest),
    ]
}

/// Encounters were first saved with "title" instead of "name".
fn rename_encounter_title<S: KeyValueStore>(db: &mut Persistence<S>) -> anyhow::Result<()> {
    let mut table = Table::new();
    let mut renamed = 0;
    for record in db.find_all_raw(ENCOUNTER_TABLE)? {
        let data = match record.data {
            Value::Object(mut fields) if !fields.contains_key("name") => {
                if let Some(title) = fields.remove("title") {
                    fields.insert("name".to_string(), title);
                    renamed += 1;
                }
                Value::Object(fields)
            }
            other => other,
        };
        table.insert(record.id, data);
    }

    if renamed > 0 {
        db.replace_table(ENCOUNTER_TABLE, &table)?;
    }
    tracing::info!("renamed title to name on {} encounters", renamed);
    Ok(())
}

/// Points of interest whose encounter no longer exists are dropped.
fn remove_orphaned_points_of_interest<S: KeyValueStore>(
    db: &mut Persistence<S>,
) -> anyhow::Result<()> {
    let encounter_ids: Vec<String> = db
        .find_all_raw(ENCOUNTER_TABLE)?
        .into_iter()
        .map(|r| r.id)
        .collect();

    let mut kept = Table::new();
    let mut removed = 0;
    for record in db.find_all_raw(POINT_OF_INTEREST_TABLE)? {
        let owner = match &record.data["encounterId"] {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => String::new(),
        };
        if encounter_ids.contains(&owner) {
            kept.insert(record.id, record.data);
        } else {
            removed += 1;
        }
    }

    if removed > 0 {
        db.replace_table(POINT_OF_INTEREST_TABLE, &kept)?;
    }
    tracing::info!("removed {} orphaned points of interest", removed);
    Ok(())
}

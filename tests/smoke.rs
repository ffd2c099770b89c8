// ABOUTME: End-to-end smoke test for the full charsheet persistence lifecycle.
// ABOUTME: Covers saving through tokens, reopening from disk, migrations, lookups, drops, and dumps.

use charsheet_core::{Encounter, PointOfInterest, builtin_migrations};
use charsheet_store::master::MASTER_KEY;
use charsheet_store::{
    Backend, KeyValueStore, Persistence, PersistenceConfig, StoreError, load_dump, save_dump,
};
use serde_json::json;

fn file_config(dir: &tempfile::TempDir) -> PersistenceConfig {
    PersistenceConfig {
        backend: Backend::File {
            path: dir.path().join("store.json"),
            capacity: 64 * 1024,
        },
        ..PersistenceConfig::default()
    }
}

#[test]
fn smoke_test_full_lifecycle() {
    let dir = tempfile::TempDir::new().unwrap();

    // 1. Open a fresh file store and bring it to the current version
    let mut db = Persistence::open(file_config(&dir)).unwrap();
    let report = db.migrate(&builtin_migrations(), "0.1.0").unwrap();
    assert_eq!(report.from, None);
    assert_eq!(report.applied.len(), 2);

    // 2. Save an encounter through a token; the id lands on the instance
    let encounters = Encounter::descriptor();
    let mut ambush = Encounter::new("Goblin ambush");
    db.token(&encounters, &mut ambush).save().unwrap();
    let ambush_id = ambush.identity.get().expect("id assigned on save");
    assert_eq!(ambush_id, 0);

    // 3. Attach points of interest to it
    let pois = PointOfInterest::descriptor();
    for name in ["Fallen log", "Thicket", "Stream"] {
        let mut poi = PointOfInterest::new(ambush_id, name);
        db.save(&pois, &mut poi).unwrap();
    }
    let mut other = Encounter::new("Tavern brawl");
    db.save(&encounters, &mut other).unwrap();
    let mut stool = PointOfInterest::new(other.identity.get().unwrap(), "Stool");
    db.save(&pois, &mut stool).unwrap();
    assert_eq!(stool.identity.get(), Some(3));

    // 4. Edit one through a token and delete another
    let mut thicket = db.find(&pois, 1).unwrap().unwrap();
    {
        let mut token = db.token(&pois, &mut thicket);
        token.instance_mut().description = Some("Something moves inside".to_string());
        token.save().unwrap();
    }
    db.delete(&pois, 2).unwrap();
    assert!(matches!(
        db.delete(&pois, 2),
        Err(StoreError::NotFound { id: Some(2), .. })
    ));
    drop(db);

    // 5. Reopen from disk and check everything survived
    let mut db = Persistence::open(file_config(&dir)).unwrap();
    assert_eq!(db.version().unwrap().as_deref(), Some("0.1.0"));
    let report = db.migrate(&builtin_migrations(), "0.1.0").unwrap();
    assert!(report.applied.is_empty());

    let ambush_pois = PointOfInterest::for_encounter(&db, &ambush).unwrap();
    let names: Vec<&str> = ambush_pois.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Fallen log", "Thicket"]);
    assert_eq!(
        ambush_pois[1].description.as_deref(),
        Some("Something moves inside")
    );
    assert_eq!(
        db.store().get(MASTER_KEY).unwrap().as_deref(),
        Some(r#"["Encounter","PointOfInterest"]"#)
    );

    // 6. Dump, drop everything, and restore
    let dump_path = dir.path().join("backup.json");
    save_dump(&dump_path, &db.dump().unwrap()).unwrap();

    db.drop_all().unwrap();
    assert_eq!(db.count("Encounter").unwrap(), 0);
    assert_eq!(db.count("PointOfInterest").unwrap(), 0);
    assert_eq!(db.tables().unwrap().len(), 2);

    db.restore_dump(&load_dump(&dump_path).unwrap()).unwrap();
    assert_eq!(db.find_all(&encounters).unwrap().len(), 2);
    assert_eq!(db.count("PointOfInterest").unwrap(), 3);
}

#[test]
fn smoke_test_person_example() {
    let mut db = Persistence::open(PersistenceConfig::default()).unwrap();

    db.save_obj("Person", 0, json!({"name": "Bob"})).unwrap();

    assert_eq!(
        db.store().get("Person").unwrap().as_deref(),
        Some(r#"{"0":{"name":"Bob"}}"#)
    );
    assert_eq!(db.tables().unwrap(), vec!["Person".to_string()]);
}

#[test]
fn smoke_test_logging_mode_keeps_going() {
    let config = PersistenceConfig {
        log_errors: true,
        ..PersistenceConfig::default()
    };
    let mut db = Persistence::open(config).unwrap();

    db.save_obj("Encounter", 0, json!({"name": "Ok"})).unwrap();
    db.save_obj("Encounter", 1, json!({"description": "no name"}))
        .unwrap();

    let found = db.find_all(&Encounter::descriptor()).unwrap();
    assert_eq!(found.len(), 1);
    assert!(db.delete(&Encounter::descriptor(), 42).is_ok());
}

#[test]
fn smoke_test_legacy_dump_is_migrated_after_restore() {
    let dir = tempfile::TempDir::new().unwrap();

    // 1. A legacy store without a version, holding old record shapes
    let mut legacy = Persistence::open(PersistenceConfig::default()).unwrap();
    legacy
        .save_obj("Encounter", 0, json!({"title": "Goblin ambush"}))
        .unwrap();
    legacy
        .save_obj("PointOfInterest", 0, json!({"encounterId": "0", "name": "Log"}))
        .unwrap();
    legacy
        .save_obj("PointOfInterest", 1, json!({"encounterId": 7, "name": "Lost"}))
        .unwrap();
    let dump_path = dir.path().join("legacy.json");
    save_dump(&dump_path, &legacy.dump().unwrap()).unwrap();

    // 2. A current store restores it and migrates, the way the binary does
    let mut db = Persistence::open(file_config(&dir)).unwrap();
    db.migrate(&builtin_migrations(), "0.1.0").unwrap();
    db.restore_dump(&load_dump(&dump_path).unwrap()).unwrap();
    assert_eq!(db.version().unwrap(), None);

    let report = db.migrate(&builtin_migrations(), "0.1.0").unwrap();
    assert_eq!(report.applied.len(), 2);
    assert_eq!(db.version().unwrap().as_deref(), Some("0.1.0"));

    // 3. Old shapes are gone and the string owner id still resolves
    let encounters = db.find_all(&Encounter::descriptor()).unwrap();
    assert_eq!(encounters.len(), 1);
    assert_eq!(encounters[0].name, "Goblin ambush");
    let pois = PointOfInterest::for_encounter(&db, &encounters[0]).unwrap();
    let names: Vec<&str> = pois.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Log"]);
    assert_eq!(db.count("PointOfInterest").unwrap(), 1);
}

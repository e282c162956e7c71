use chrono::NaiveDate;
use empdim_core::db::open_db_in_memory;
use empdim_core::{
    infinite_expiry, AppliedChange, AttributePatch, ChangeCommand, EmployeeAttributes, EntityId,
    QualityValidator, Scd2Engine, SqliteVersionedRecordStore, StoreError, VersionedRecordStore,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn insert_ana() -> ChangeCommand {
    ChangeCommand::NewEntity {
        entity_id: EntityId::from("E1"),
        attributes: EmployeeAttributes::from_patch(&AttributePatch {
            first_name: Some("Ana".to_string()),
            last_name: Some("Diaz".to_string()),
            city: Some("Lima".to_string()),
            ..AttributePatch::default()
        }),
    }
}

fn move_to(city: &str, effective_date: Option<NaiveDate>) -> ChangeCommand {
    ChangeCommand::AttributeChange {
        entity_id: EntityId::from("E1"),
        changes: AttributePatch {
            city: Some(city.to_string()),
            ..AttributePatch::default()
        },
        effective_date,
    }
}

#[test]
fn new_entity_produces_single_open_ended_current_row() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteVersionedRecordStore::try_new(&conn).unwrap();
    let engine = Scd2Engine::new(&store, date(2025, 8, 1));

    let applied = engine.apply(&insert_ana()).unwrap();

    let history = store.history(&EntityId::from("E1")).unwrap();
    assert_eq!(history.len(), 1);
    let row = &history[0];
    assert!(matches!(applied, AppliedChange::Inserted { surrogate_key, .. } if surrogate_key == row.surrogate_key));
    assert!(row.is_current);
    assert_eq!(row.effective_date, date(2025, 8, 1));
    assert_eq!(row.expiry_date, infinite_expiry());
    assert_eq!(row.attributes.first_name.as_deref(), Some("Ana"));
    assert_eq!(row.attributes.last_name.as_deref(), Some("Diaz"));
    assert_eq!(row.attributes.city.as_deref(), Some("Lima"));
}

#[test]
fn attribute_change_closes_prior_row_and_carries_unchanged_fields() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteVersionedRecordStore::try_new(&conn).unwrap();
    let engine = Scd2Engine::new(&store, date(2025, 8, 1));

    engine.apply(&insert_ana()).unwrap();
    engine
        .apply(&move_to("Cusco", Some(date(2025, 8, 13))))
        .unwrap();

    let history = store.history(&EntityId::from("E1")).unwrap();
    assert_eq!(history.len(), 2);

    let (first, second) = (&history[0], &history[1]);
    assert_eq!(first.expiry_date, date(2025, 8, 12));
    assert!(!first.is_current);
    assert_eq!(first.attributes.city.as_deref(), Some("Lima"));

    assert_eq!(second.attributes.first_name.as_deref(), Some("Ana"));
    assert_eq!(second.attributes.last_name.as_deref(), Some("Diaz"));
    assert_eq!(second.attributes.full_name.as_deref(), Some("Ana Diaz"));
    assert_eq!(second.attributes.city.as_deref(), Some("Cusco"));
    assert_eq!(second.effective_date, date(2025, 8, 13));
    assert_eq!(second.expiry_date, infinite_expiry());
    assert!(second.is_current);
}

#[test]
fn insert_then_change_yields_adjacent_non_overlapping_intervals() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteVersionedRecordStore::try_new(&conn).unwrap();
    let engine = Scd2Engine::new(&store, date(2025, 8, 1));

    engine.apply(&insert_ana()).unwrap();
    engine
        .apply(&move_to("Cusco", Some(date(2025, 9, 1))))
        .unwrap();

    let history = store.history(&EntityId::from("E1")).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(
        history[0].expiry_date.succ_opt().unwrap(),
        history[1].effective_date
    );
    assert!(history.iter().all(|row| row.has_valid_range()));
    assert_eq!(history.iter().filter(|row| row.is_current).count(), 1);
}

#[test]
fn undated_change_is_effective_today() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteVersionedRecordStore::try_new(&conn).unwrap();

    Scd2Engine::new(&store, date(2025, 8, 1))
        .apply(&insert_ana())
        .unwrap();
    let applied = Scd2Engine::new(&store, date(2025, 8, 20))
        .apply(&move_to("Cusco", None))
        .unwrap();

    assert!(matches!(
        applied,
        AppliedChange::Versioned { effective_date, .. } if effective_date == date(2025, 8, 20)
    ));
    let current = store
        .current_version(&EntityId::from("E1"))
        .unwrap()
        .unwrap();
    assert_eq!(current.effective_date, date(2025, 8, 20));
}

#[test]
fn name_change_recomputes_full_name() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteVersionedRecordStore::try_new(&conn).unwrap();
    let engine = Scd2Engine::new(&store, date(2025, 8, 1));

    engine.apply(&insert_ana()).unwrap();
    engine
        .apply(&ChangeCommand::AttributeChange {
            entity_id: EntityId::from("E1"),
            changes: AttributePatch {
                last_name: Some("Rojas".to_string()),
                city: Some("Arequipa".to_string()),
                ..AttributePatch::default()
            },
            effective_date: Some(date(2025, 10, 1)),
        })
        .unwrap();

    let current = store
        .current_version(&EntityId::from("E1"))
        .unwrap()
        .unwrap();
    assert_eq!(current.attributes.first_name.as_deref(), Some("Ana"));
    assert_eq!(current.attributes.full_name.as_deref(), Some("Ana Rojas"));
    assert_eq!(current.attributes.city.as_deref(), Some("Arequipa"));
}

#[test]
fn change_for_unknown_entity_fails_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteVersionedRecordStore::try_new(&conn).unwrap();
    let engine = Scd2Engine::new(&store, date(2025, 8, 1));

    let err = engine
        .apply(&move_to("Cusco", Some(date(2025, 8, 13))))
        .unwrap_err();

    assert!(matches!(err, StoreError::NoCurrentVersion(id) if id.as_str() == "E1"));
    assert!(store.history(&EntityId::from("E1")).unwrap().is_empty());
}

#[test]
fn reapplying_same_effective_date_versions_again_without_idempotence() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteVersionedRecordStore::try_new(&conn).unwrap();
    let engine = Scd2Engine::new(&store, date(2025, 8, 1));
    let change = move_to("Cusco", Some(date(2025, 8, 13)));

    engine.apply(&insert_ana()).unwrap();
    engine.apply(&change).unwrap();
    engine.apply(&change).unwrap();

    let history = store.history(&EntityId::from("E1")).unwrap();
    assert_eq!(history.len(), 3);

    let second = &history[1];
    let third = &history[2];
    assert!(third.surrogate_key > second.surrogate_key);
    assert!(!second.is_current);
    assert_eq!(second.expiry_date, date(2025, 8, 12));
    assert!(third.is_current);
    assert_eq!(third.attributes.city.as_deref(), Some("Cusco"));
    assert_eq!(third.effective_date, date(2025, 8, 13));

    // The same-day close leaves version 2 with an inverted range.
    let validator = QualityValidator::new(SqliteVersionedRecordStore::try_new(&conn).unwrap());
    let inverted = validator.find_inverted_ranges().unwrap();
    assert_eq!(inverted.into_iter().collect::<Vec<_>>(), vec![second.surrogate_key]);
    assert!(validator.find_duplicate_currents().unwrap().is_empty());
}

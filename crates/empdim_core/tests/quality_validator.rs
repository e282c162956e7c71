use empdim_core::db::open_db_in_memory;
use empdim_core::{EntityId, QualityValidator, SqliteVersionedRecordStore};
use rusqlite::Connection;

fn validator(conn: &Connection) -> QualityValidator<SqliteVersionedRecordStore<'_>> {
    QualityValidator::new(SqliteVersionedRecordStore::try_new(conn).unwrap())
}

#[test]
fn empty_dimension_is_clean() {
    let conn = open_db_in_memory().unwrap();

    let report = validator(&conn).validate().unwrap();

    assert!(report.is_clean());
}

#[test]
fn two_current_rows_for_one_entity_report_one_duplicate() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO dim_employee (employee_id, effective_date) VALUES ('E9', '2025-01-01');
         INSERT INTO dim_employee (employee_id, effective_date) VALUES ('E9', '2025-02-01');
         INSERT INTO dim_employee (employee_id, effective_date) VALUES ('E10', '2025-02-01');",
    )
    .unwrap();

    let duplicates = validator(&conn).find_duplicate_currents().unwrap();

    assert_eq!(duplicates.len(), 1);
    assert!(duplicates.contains(&EntityId::from("E9")));
}

#[test]
fn inverted_and_empty_ranges_are_reported_by_surrogate_key() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO dim_employee (employee_key, employee_id, effective_date, expiry_date, is_current)
         VALUES (1, 'E1', '2025-03-01', '2025-02-01', 0);
         INSERT INTO dim_employee (employee_key, employee_id, effective_date, expiry_date, is_current)
         VALUES (2, 'E1', '2025-03-01', '2025-03-01', 0);
         INSERT INTO dim_employee (employee_key, employee_id, effective_date, expiry_date, is_current)
         VALUES (3, 'E1', '2025-03-02', '9999-12-31', 1);",
    )
    .unwrap();

    let inverted = validator(&conn).find_inverted_ranges().unwrap();

    assert_eq!(inverted.into_iter().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn current_flag_disagreeing_with_expiry_is_reported() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO dim_employee (employee_key, employee_id, effective_date, expiry_date, is_current)
         VALUES (1, 'E1', '2025-01-01', '2025-02-01', 1);
         INSERT INTO dim_employee (employee_key, employee_id, effective_date, expiry_date, is_current)
         VALUES (2, 'E2', '2025-01-01', '9999-12-31', 0);
         INSERT INTO dim_employee (employee_key, employee_id, effective_date, expiry_date, is_current)
         VALUES (3, 'E3', '2025-01-01', '9999-12-31', 1);",
    )
    .unwrap();

    let report = validator(&conn).validate().unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.flag_mismatches.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    assert!(report.duplicate_currents.is_empty());
    assert!(report.inverted_ranges.is_empty());
}

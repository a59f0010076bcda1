use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use appreset::common::config::CleaningOptions;
use appreset::common::errors::ResetError;
use appreset::database::{inspect_database, is_safe_identifier, sanitize_database};

fn fixture(dir: &Path) -> PathBuf {
    let path = dir.join("state.vscdb");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE ItemTable (key TEXT, value BLOB);
         INSERT INTO ItemTable VALUES ('machineId', 'abc');
         INSERT INTO ItemTable VALUES ('augment.sessions', '[1,2]');
         INSERT INTO ItemTable VALUES ('workbench.theme', 'dark');
         INSERT INTO ItemTable VALUES ('cursorAuth/accessToken', 'xyz');
         CREATE TABLE recentFiles (path TEXT);
         INSERT INTO recentFiles VALUES ('/a'), ('/b');
         CREATE TABLE members (id INTEGER, email TEXT, note TEXT);
         INSERT INTO members VALUES (1, 'a@example.com', 'kept');",
    )
    .unwrap();
    path
}

fn count(path: &Path, sql: &str) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(sql, [], |r| r.get(0)).unwrap()
}

#[test]
fn test_sanitize_with_default_options() {
    let tmp = TempDir::new().unwrap();
    let path = fixture(tmp.path());

    let outcome = sanitize_database(&path, &CleaningOptions::default()).unwrap();
    assert_eq!(outcome.tables_emptied, 1);
    assert!(outcome.rows_deleted >= 4);
    assert_eq!(outcome.rows_blanked, 1);

    assert_eq!(count(&path, "SELECT count(*) FROM recentFiles"), 0);
    assert_eq!(count(&path, "SELECT count(*) FROM ItemTable"), 2);
    assert_eq!(
        count(&path, "SELECT count(*) FROM ItemTable WHERE key = 'workbench.theme'"),
        1
    );
    assert_eq!(count(&path, "SELECT count(*) FROM members WHERE email IS NULL"), 1);
}

#[test]
fn test_sanitize_twice_is_stable() {
    let tmp = TempDir::new().unwrap();
    let path = fixture(tmp.path());

    sanitize_database(&path, &CleaningOptions::default()).unwrap();
    let second = sanitize_database(&path, &CleaningOptions::default()).unwrap();
    assert_eq!(second.rows_affected(), 0);
}

#[test]
fn test_unsafe_table_names_skipped() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("odd.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE \"user sessions\" (key TEXT, value TEXT);
             INSERT INTO \"user sessions\" VALUES ('session', 'abc');",
        )
        .unwrap();
    }

    assert!(!is_safe_identifier("user sessions"));
    let outcome = sanitize_database(&path, &CleaningOptions::default()).unwrap();
    assert_eq!(outcome.rows_affected(), 0);
    assert_eq!(count(&path, "SELECT count(*) FROM \"user sessions\""), 1);
}

#[test]
fn test_garbage_file_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.db");
    std::fs::write(&path, b"definitely not a sqlite database, just text padding it out").unwrap();

    let err = sanitize_database(&path, &CleaningOptions::default()).unwrap_err();
    assert!(matches!(err, ResetError::DatabaseUnavailable { .. }));
}

#[test]
fn test_inspect_reports_key_value_tables() {
    let tmp = TempDir::new().unwrap();
    let path = fixture(tmp.path());

    let inspection = inspect_database(&path).unwrap();
    assert_eq!(inspection.tables, vec!["ItemTable", "members", "recentFiles"]);
    assert_eq!(inspection.relevant.len(), 1);

    let sample = &inspection.relevant[0];
    assert_eq!(sample.descriptor.table, "ItemTable");
    assert_eq!(sample.descriptor.key_column, "key");
    assert_eq!(sample.descriptor.value_column, "value");
    assert_eq!(sample.row_count, 4);
    assert!(sample.rows.iter().any(|(k, v)| k == "workbench.theme" && v == "dark"));
}

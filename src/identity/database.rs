use rusqlite::{params, Transaction};
use std::path::Path;

use super::{FreshIds, MutationOutcome};
use crate::common::errors::{ResetError, Result};
use crate::database::connection::open_database;
use crate::database::schema::{self, quote, TableDescriptor};

/// Rewrite telemetry rows and delete session rows in every key/value table.
///
/// Runs in one transaction; counts statements that touched at least one
/// row. A statement that fails is logged and skipped. The file is compacted afterwards when anything changed.
pub fn mutate_database(
    path: &Path,
    telemetry_keys: &[String],
    session_keys: &[String],
    ids: &FreshIds,
) -> Result<MutationOutcome> {
    let (mut conn, _strategy) = open_database(path)?;

    let tables = schema::relevant_tables(&conn).map_err(|e| ResetError::database(path, e))?;
    if tables.is_empty() {
        tracing::debug!(path = %path.display(), "No key/value tables found");
        return Ok(MutationOutcome::default());
    }

    let tx = conn.transaction().map_err(|e| ResetError::database(path, e))?;
    let mut outcome = MutationOutcome::default();
    let mut failed = 0usize;
    for descriptor in &tables {
        let (table_outcome, table_failed) =
            mutate_table(&tx, descriptor, telemetry_keys, session_keys, ids);
        outcome.keys_updated += table_outcome.keys_updated;
        outcome.keys_deleted += table_outcome.keys_deleted;
        failed += table_failed;
    }
    tx.commit().map_err(|e| ResetError::database(path, e))?;

    if !outcome.is_empty() {
        if let Err(e) = conn.execute_batch("VACUUM") {
            tracing::warn!(path = %path.display(), error = %e, "VACUUM failed");
        }
        tracing::info!(
            path = %path.display(),
            keys_updated = outcome.keys_updated,
            keys_deleted = outcome.keys_deleted,
            "Database identifiers rewritten"
        );
    }
    if failed > 0 {
        tracing::warn!(path = %path.display(), statements_failed = failed, "Some identifier statements were skipped");
    }

    Ok(outcome)
}

fn mutate_table(
    tx: &Transaction<'_>,
    descriptor: &TableDescriptor,
    telemetry_keys: &[String],
    session_keys: &[String],
    ids: &FreshIds,
) -> (MutationOutcome, usize) {
    let mut outcome = MutationOutcome::default();
    let mut failed = 0usize;

    // Descriptors only ever carry validated names
    let table = quote(&descriptor.table);
    let key = quote(&descriptor.key_column);
    let value = quote(&descriptor.value_column);

    let update_sql = format!("UPDATE {} SET {} = ?1 WHERE {} = ?2", table, value, key);
    for telemetry_key in telemetry_keys {
        match tx.execute(&update_sql, params![ids.for_key(telemetry_key), telemetry_key]) {
            Ok(0) => {}
            Ok(_) => outcome.keys_updated += 1,
            Err(e) => {
                tracing::debug!(table = %descriptor.table, key = %telemetry_key, error = %e, "Update failed");
                failed += 1;
            }
        }
    }

    let delete_sql = format!("DELETE FROM {} WHERE {} = ?1", table, key);
    for session_key in session_keys {
        match tx.execute(&delete_sql, params![session_key]) {
            Ok(0) => {}
            Ok(_) => outcome.keys_deleted += 1,
            Err(e) => {
                tracing::debug!(table = %descriptor.table, key = %session_key, error = %e, "Delete failed");
                failed += 1;
            }
        }
    }

    (outcome, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.vscdb");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE ItemTable (key TEXT UNIQUE, value BLOB);
                 INSERT INTO ItemTable VALUES ('telemetry.machineId', 'old');
                 INSERT INTO ItemTable VALUES ('lastSessionId', 'old-session');
                 INSERT INTO ItemTable VALUES ('authToken', 'secret');",
            )
            .unwrap();
        }

        let ids = FreshIds::generate();
        let telemetry = keys(&["telemetry.machineId", "lastSessionId", "deviceId"]);
        let sessions = keys(&["authToken"]);

        let outcome = mutate_database(&path, &telemetry, &sessions, &ids).unwrap();
        assert_eq!(outcome.keys_updated, 2);
        assert_eq!(outcome.keys_deleted, 1);

        let conn = Connection::open(&path).unwrap();
        let machine: String = conn
            .query_row(
                "SELECT value FROM ItemTable WHERE key = 'telemetry.machineId'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(machine, ids.machine_id);
        let session: String = conn
            .query_row("SELECT value FROM ItemTable WHERE key = 'lastSessionId'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(session, ids.session_id);

        let again = mutate_database(&path, &telemetry, &sessions, &FreshIds::generate()).unwrap();
        assert_eq!(again.keys_deleted, 0);
    }

    #[test]
    fn test_guarded_table_does_not_roll_back_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.vscdb");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE ItemTable (key TEXT, value TEXT);
                 INSERT INTO ItemTable VALUES ('machineId', 'old');
                 CREATE TABLE Settings (key TEXT, value TEXT);
                 INSERT INTO Settings VALUES ('machineId', 'old');
                 CREATE TRIGGER settings_readonly BEFORE UPDATE ON Settings
                 BEGIN SELECT RAISE(ABORT, 'readonly'); END;",
            )
            .unwrap();
        }

        let ids = FreshIds::generate();
        let outcome = mutate_database(&path, &keys(&["machineId"]), &[], &ids).unwrap();
        assert_eq!(outcome.keys_updated, 1);

        let conn = Connection::open(&path).unwrap();
        let item: String = conn
            .query_row("SELECT value FROM ItemTable WHERE key = 'machineId'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(item, ids.machine_id);
        let settings: String = conn
            .query_row("SELECT value FROM Settings WHERE key = 'machineId'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(settings, "old");
    }

    #[test]
    fn test_unsafe_table_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE \"Item;Table\" (key TEXT, value TEXT);
                 INSERT INTO \"Item;Table\" VALUES ('machineId', 'old');",
            )
            .unwrap();
        }

        let outcome =
            mutate_database(&path, &keys(&["machineId"]), &[], &FreshIds::generate()).unwrap();
        assert!(outcome.is_empty());

        let conn = Connection::open(&path).unwrap();
        let value: String = conn
            .query_row("SELECT value FROM \"Item;Table\"", [], |r| r.get(0))
            .unwrap();
        assert_eq!(value, "old");
    }
}

use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;

use appreset::common::config::CleaningOptions;
use appreset::identity::{CandidateKind, IdentifierMutator};

fn is_uuid(value: &Value) -> bool {
    value.as_str().is_some_and(|s| uuid::Uuid::parse_str(s).is_ok())
}

#[test]
fn test_candidates_by_name_skip_other_files() {
    let tmp = TempDir::new().unwrap();
    let global = tmp.path().join("User/globalStorage");
    std::fs::create_dir_all(&global).unwrap();
    std::fs::write(global.join("storage.json"), "{}").unwrap();
    std::fs::write(global.join("state.vscdb"), b"").unwrap();
    std::fs::write(global.join("other.db"), b"").unwrap();

    let mutator = IdentifierMutator::new(&CleaningOptions::default());
    let mut names: Vec<String> = mutator
        .find_candidates(tmp.path())
        .iter()
        .map(|c| c.file_name())
        .collect();
    names.sort();
    assert_eq!(names, vec!["state.vscdb", "storage.json"]);
}

#[test]
fn test_storage_json_rewritten_in_place() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("storage.json");
    std::fs::write(
        &path,
        r#"{
  "telemetry.machineId": "old-machine",
  "telemetry.deviceId": "old-device",
  "windowsState": { "lastActiveWindow": { "sessionId": "old-session" } },
  "profiles": [ { "name": "Default", "authToken": "t-1" } ],
  "theme": "dark"
}"#,
    )
    .unwrap();

    let mutator = IdentifierMutator::new(&CleaningOptions::default());
    let candidates = mutator.find_candidates(tmp.path());
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].kind, CandidateKind::Json);

    let outcome = mutator.mutate(&candidates[0]).unwrap().unwrap();
    assert_eq!(outcome.keys_updated, 3);
    assert_eq!(outcome.keys_deleted, 1);

    let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(is_uuid(&doc["telemetry.machineId"]));
    assert_eq!(doc["telemetry.machineId"], doc["telemetry.deviceId"]);
    let session = &doc["windowsState"]["lastActiveWindow"]["sessionId"];
    assert!(is_uuid(session));
    assert_ne!(session, &doc["telemetry.machineId"]);
    assert!(doc["profiles"][0].get("authToken").is_none());
    assert_eq!(doc["profiles"][0]["name"], "Default");
    assert_eq!(doc["theme"], "dark");

    // Key order survives the rewrite
    let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
    assert_eq!(keys[0], "telemetry.machineId");
    assert_eq!(keys[4], "theme");
}

#[test]
fn test_rerun_deletes_nothing() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("storage.json");
    std::fs::write(&path, r#"{"machineId":"m","accessToken":"a"}"#).unwrap();

    let mutator = IdentifierMutator::new(&CleaningOptions::default());
    let candidate = mutator.find_candidates(tmp.path()).remove(0);

    let first = mutator.mutate(&candidate).unwrap().unwrap();
    assert_eq!(first.keys_deleted, 1);
    let second = mutator.mutate(&candidate).unwrap().unwrap();
    assert_eq!(second.keys_deleted, 0);
    assert_eq!(second.keys_updated, 1);
}

#[test]
fn test_state_database_mutated() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("state.vscdb");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB);
             INSERT INTO ItemTable VALUES ('telemetry.machineId', 'old');
             INSERT INTO ItemTable VALUES ('telemetry.sqmId', 'keep');
             INSERT INTO ItemTable VALUES ('refreshToken', 'secret');",
        )
        .unwrap();
    }

    let mutator = IdentifierMutator::new(&CleaningOptions::default());
    let candidate = mutator.find_candidates(tmp.path()).remove(0);
    assert_eq!(candidate.kind, CandidateKind::Database);

    let outcome = mutator.mutate(&candidate).unwrap().unwrap();
    assert_eq!(outcome.keys_updated, 1);
    assert_eq!(outcome.keys_deleted, 1);

    let conn = Connection::open(&path).unwrap();
    let machine: String = conn
        .query_row(
            "SELECT value FROM ItemTable WHERE key = 'telemetry.machineId'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert!(uuid::Uuid::parse_str(&machine).is_ok());
    let remaining: i64 = conn
        .query_row("SELECT count(*) FROM ItemTable", [], |r| r.get(0))
        .unwrap();
    assert_eq!(remaining, 2);
}

#[test]
fn test_vanished_candidate_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("storage.json");
    std::fs::write(&path, "{}").unwrap();

    let mutator = IdentifierMutator::new(&CleaningOptions::default());
    let candidate = mutator.find_candidates(tmp.path()).remove(0);
    std::fs::remove_file(&path).unwrap();

    assert!(mutator.mutate(&candidate).is_err());
}

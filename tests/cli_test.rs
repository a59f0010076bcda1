use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use appreset::common::config::{ApplicationProfile, Config};
use appreset::common::paths;

/// Binary isolated from the real home directory and config search path
fn appreset(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("appreset").unwrap();
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("APPRESET_CONFIG")
        .env_remove("RUST_LOG")
        .current_dir(home);
    cmd
}

/// Config with a single "demo" application under `home/Demo`
fn write_demo_config(home: &Path) -> PathBuf {
    let mut config = Config::default();
    config.applications.clear();

    let mut data_paths = BTreeMap::new();
    data_paths.insert(
        paths::current_os_key().to_string(),
        vec![home.join("Demo").display().to_string()],
    );
    config.applications.insert(
        "demo".to_string(),
        ApplicationProfile {
            display_name: "Demo App".to_string(),
            process_names: vec!["appreset-demo-process".to_string()],
            data_paths,
        },
    );
    config.backup_options.directory = Some(home.join("backups").display().to_string());
    config.safety_options.check_running_processes = false;

    let path = home.join("demo_config.json");
    config.save(&path).unwrap();
    path
}

fn demo_install(home: &Path) -> PathBuf {
    let app = home.join("Demo");
    std::fs::create_dir_all(app.join("Cache")).unwrap();
    std::fs::write(app.join("Cache/blob"), vec![0u8; 4096]).unwrap();

    let db = app.join("state.vscdb");
    let conn = Connection::open(&db).unwrap();
    conn.execute_batch(
        "CREATE TABLE ItemTable (key TEXT, value BLOB);
         INSERT INTO ItemTable VALUES ('machineId', 'old-value');
         INSERT INTO ItemTable VALUES ('sessionId', 'token-123');",
    )
    .unwrap();
    db
}

// ─── Help & version ──────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    appreset(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("identity"))
        .stdout(predicate::str::contains("discover"))
        .stdout(predicate::str::contains("clean"))
        .stdout(predicate::str::contains("backups"))
        .stdout(predicate::str::contains("inspect-db"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    appreset(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("appreset"));
}

// ─── Discover ────────────────────────────────────────────────────────────────

#[test]
fn test_discover_json() {
    let home = TempDir::new().unwrap();
    demo_install(home.path());
    let config = write_demo_config(home.path());

    appreset(home.path())
        .args(["discover", "--format", "json", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"demo\""))
        .stdout(predicate::str::contains("\"found\": true"));
}

#[test]
fn test_discover_default_config() {
    let home = TempDir::new().unwrap();
    appreset(home.path())
        .args(["discover", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cursor"))
        .stdout(predicate::str::contains("windsurf"));
}

// ─── Clean ───────────────────────────────────────────────────────────────────

#[test]
fn test_clean_requires_target() {
    let home = TempDir::new().unwrap();
    appreset(home.path()).arg("clean").assert().failure();
}

#[test]
fn test_clean_unknown_application() {
    let home = TempDir::new().unwrap();
    let config = write_demo_config(home.path());

    appreset(home.path())
        .args(["clean", "nope", "--yes", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown application 'nope'"));
}

#[test]
fn test_clean_dry_run_leaves_data() {
    let home = TempDir::new().unwrap();
    let db = demo_install(home.path());
    let config = write_demo_config(home.path());

    appreset(home.path())
        .args(["clean", "demo", "--dry-run", "--quiet", "--config"])
        .arg(&config)
        .assert()
        .success();

    let conn = Connection::open(&db).unwrap();
    let value: String = conn
        .query_row("SELECT value FROM ItemTable WHERE key = 'machineId'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(value, "old-value");
    assert!(home.path().join("Demo/Cache/blob").exists());
}

#[test]
fn test_clean_json_report() {
    let home = TempDir::new().unwrap();
    let db = demo_install(home.path());
    let config = write_demo_config(home.path());

    appreset(home.path())
        .args(["clean", "demo", "--yes", "--format", "json", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"application\": \"demo\""))
        .stdout(predicate::str::contains("\"bytes_freed\""));

    let conn = Connection::open(&db).unwrap();
    let sessions: i64 = conn
        .query_row("SELECT count(*) FROM ItemTable WHERE key = 'sessionId'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(sessions, 0);
    assert!(!home.path().join("Demo/Cache/blob").exists());

    appreset(home.path())
        .args(["backups", "list", "--format", "json", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("demo_cache_Cache_"));
}

#[test]
fn test_clean_declined_confirmation() {
    let home = TempDir::new().unwrap();
    let db = demo_install(home.path());
    let config = write_demo_config(home.path());

    appreset(home.path())
        .args(["clean", "demo", "--config"])
        .arg(&config)
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled"));

    assert!(db.exists());
    assert!(home.path().join("Demo/Cache/blob").exists());
}

// ─── Backups ─────────────────────────────────────────────────────────────────

#[test]
fn test_backups_list_empty() {
    let home = TempDir::new().unwrap();
    let config = write_demo_config(home.path());

    appreset(home.path())
        .args(["backups", "list", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups found"));
}

#[test]
fn test_restore_unknown_backup() {
    let home = TempDir::new().unwrap();
    let config = write_demo_config(home.path());

    appreset(home.path())
        .args(["backups", "restore", "missing_20240101_000000", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No backup named"));
}

#[test]
fn test_backups_prune() {
    let home = TempDir::new().unwrap();
    let config = write_demo_config(home.path());

    appreset(home.path())
        .args(["backups", "prune", "--days", "7", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups to prune"));
}

// ─── Inspect ─────────────────────────────────────────────────────────────────

#[test]
fn test_inspect_db() {
    let home = TempDir::new().unwrap();
    let db = demo_install(home.path());

    appreset(home.path())
        .args(["inspect-db", "--no-color"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("ItemTable"))
        .stdout(predicate::str::contains("machineId"));
}

#[test]
fn test_inspect_missing_db() {
    let home = TempDir::new().unwrap();
    appreset(home.path())
        .args(["inspect-db", "nothing.vscdb"])
        .assert()
        .failure();
    assert!(!home.path().join("nothing.vscdb").exists());
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_and_init() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("custom.json");

    appreset(home.path())
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.json"));

    appreset(home.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    appreset(home.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    appreset(home.path())
        .args(["config", "init", "--force", "--config"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_config_show_json() {
    let home = TempDir::new().unwrap();
    appreset(home.path())
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cleaning_options"))
        .stdout(predicate::str::contains("telemetry.machineId"));
}

#[test]
fn test_config_toml_roundtrip() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("reset_config.toml");

    appreset(home.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();

    appreset(home.path())
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[backup_options]"));
}

// ─── Completions ─────────────────────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    appreset(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("appreset"));
}

#[test]
fn test_invalid_subcommand() {
    let home = TempDir::new().unwrap();
    appreset(home.path())
        .arg("nonexistent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

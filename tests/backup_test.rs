use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use appreset::cleaner::{BackupKind, BackupManager};
use appreset::common::errors::ResetError;

fn source_tree(dir: &Path) -> std::path::PathBuf {
    let tree = dir.join("User");
    std::fs::create_dir_all(tree.join("globalStorage")).unwrap();
    std::fs::write(tree.join("settings.json"), r#"{"editor.fontSize":14}"#).unwrap();
    std::fs::write(tree.join("globalStorage/storage.json"), r#"{"machineId":"abc"}"#).unwrap();
    tree
}

fn age(path: &Path, days: u64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60))
        .unwrap();
}

#[test]
fn test_mirror_backup_and_restore_directory() {
    let tmp = TempDir::new().unwrap();
    let tree = source_tree(tmp.path());
    let manager = BackupManager::new(tmp.path().join("backups"), false, true).unwrap();

    let record = manager.backup(&tree, "demo_user").unwrap().unwrap();
    assert_eq!(record.kind, BackupKind::Directory);
    assert!(record.name().starts_with("demo_user_"));
    assert!(record.backup_path.join("globalStorage/storage.json").exists());

    std::fs::remove_dir_all(&tree).unwrap();
    let restored = manager.restore(&record, None, false).unwrap();
    assert_eq!(restored, tree);
    assert_eq!(
        std::fs::read_to_string(tree.join("globalStorage/storage.json")).unwrap(),
        r#"{"machineId":"abc"}"#
    );
}

#[test]
fn test_archive_backup_and_restore_elsewhere() {
    let tmp = TempDir::new().unwrap();
    let tree = source_tree(tmp.path());
    let manager = BackupManager::new(tmp.path().join("backups"), true, true).unwrap();

    let record = manager.backup(&tree, "demo_user").unwrap().unwrap();
    assert_eq!(record.kind, BackupKind::Archive);
    assert!(record.name().ends_with(".zip"));

    let target = tmp.path().join("restored");
    manager.restore(&record, Some(&target), false).unwrap();
    assert_eq!(
        std::fs::read_to_string(target.join("settings.json")).unwrap(),
        r#"{"editor.fontSize":14}"#
    );
    assert!(target.join("globalStorage/storage.json").is_file());
}

#[test]
fn test_archive_of_single_file_restores_as_file() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("state.vscdb");
    std::fs::write(&file, b"sqlite bytes").unwrap();
    let manager = BackupManager::new(tmp.path().join("backups"), true, false).unwrap();

    let record = manager.backup(&file, "demo_database_state.vscdb").unwrap().unwrap();
    std::fs::remove_file(&file).unwrap();

    manager.restore(&record, None, false).unwrap();
    assert!(file.is_file());
    assert_eq!(std::fs::read(&file).unwrap(), b"sqlite bytes");
}

#[test]
fn test_restore_refuses_existing_target() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("storage.json");
    std::fs::write(&file, "original").unwrap();
    let manager = BackupManager::new(tmp.path().join("backups"), false, true).unwrap();

    let record = manager.backup(&file, "demo").unwrap().unwrap();
    std::fs::write(&file, "changed").unwrap();

    let err = manager.restore(&record, None, false).unwrap_err();
    assert!(matches!(err, ResetError::RestoreTargetExists { .. }));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "changed");

    manager.restore(&record, None, true).unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "original");
}

#[test]
fn test_missing_source_fails() {
    let tmp = TempDir::new().unwrap();
    let manager = BackupManager::new(tmp.path().join("backups"), false, false).unwrap();

    let err = manager.backup(&tmp.path().join("nope"), "demo").unwrap_err();
    assert!(matches!(err, ResetError::BackupSourceMissing { .. }));
}

#[test]
fn test_list_and_find() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.json");
    std::fs::write(&file, "{}").unwrap();
    let manager = BackupManager::new(tmp.path().join("backups"), false, false).unwrap();

    let first = manager.backup(&file, "one").unwrap().unwrap();
    let second = manager.backup(&file, "two").unwrap().unwrap();

    let listed = manager.list_backups().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(manager.find(&first.name()).unwrap().is_some());
    assert!(manager.find("no-such-backup").unwrap().is_none());

    std::fs::remove_file(&second.backup_path).unwrap();
    assert_eq!(manager.list_backups().unwrap().len(), 1);
}

#[test]
fn test_prune_removes_only_old_entries() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("storage.json");
    std::fs::write(&file, "{}").unwrap();
    let manager = BackupManager::new(tmp.path().join("backups"), false, false).unwrap();

    let old = manager.backup(&file, "old").unwrap().unwrap();
    let fresh = manager.backup(&file, "fresh").unwrap().unwrap();
    age(&old.backup_path, 40);

    let report = manager.prune_older_than(30).unwrap();
    assert_eq!(report.pruned.len(), 1);
    assert_eq!(report.pruned[0].name, old.name());
    assert_eq!(report.total_bytes_freed, 2);
    assert!(report.errors.is_empty());

    assert!(!old.backup_path.exists());
    assert!(fresh.backup_path.exists());
    assert!(manager.root().join("manifest.jsonl").exists());

    let disabled = manager.prune_older_than(0).unwrap();
    assert!(disabled.pruned.is_empty());
}

use crate::common::{mock_install, MAIN_JS_UNPATCHED};
use cursor_patcher::{BackupError, BackupManager, MemoryDiagnostics, SourcePatcher};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_backup_patch_restore_roundtrip() {
    let dir = TempDir::new().unwrap();
    let paths = mock_install(dir.path(), "0.46.1", MAIN_JS_UNPATCHED);
    let diag = MemoryDiagnostics::new();
    let manager = BackupManager::new(&paths.target_path);

    manager.backup(&diag).unwrap();
    let _ = SourcePatcher::new(&paths.target_path).patch(&diag).unwrap();
    assert_ne!(fs::read_to_string(&paths.target_path).unwrap(), MAIN_JS_UNPATCHED);

    manager.restore(&diag).unwrap();

    assert_eq!(
        fs::read(&paths.target_path).unwrap(),
        MAIN_JS_UNPATCHED.as_bytes()
    );
}

#[test]
fn test_restore_after_arbitrary_mutation() {
    let dir = TempDir::new().unwrap();
    let original: Vec<u8> = (0u8..=255).collect();
    let target = dir.path().join("main.js");
    fs::write(&target, &original).unwrap();
    let manager = BackupManager::new(&target);
    let diag = MemoryDiagnostics::new();

    manager.backup(&diag).unwrap();
    fs::write(&target, b"").unwrap();
    manager.restore(&diag).unwrap();

    assert_eq!(fs::read(&target).unwrap(), original);
}

#[test]
fn test_restore_requires_backup() {
    let dir = TempDir::new().unwrap();
    let paths = mock_install(dir.path(), "0.46.1", MAIN_JS_UNPATCHED);

    let err = BackupManager::new(&paths.target_path)
        .restore(&MemoryDiagnostics::new())
        .unwrap_err();

    assert!(matches!(err, BackupError::BackupNotFound { .. }));
}

#[test]
#[cfg(unix)]
fn test_roundtrip_preserves_permission_bits() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let paths = mock_install(dir.path(), "0.46.1", MAIN_JS_UNPATCHED);
    fs::set_permissions(&paths.target_path, fs::Permissions::from_mode(0o664)).unwrap();
    let diag = MemoryDiagnostics::new();
    let manager = BackupManager::new(&paths.target_path);

    manager.backup(&diag).unwrap();
    let _ = SourcePatcher::new(&paths.target_path).patch(&diag).unwrap();
    let patched_mode = fs::metadata(&paths.target_path).unwrap().permissions().mode();
    assert_eq!(patched_mode & 0o7777, 0o664);

    manager.restore(&diag).unwrap();
    let restored_mode = fs::metadata(&paths.target_path).unwrap().permissions().mode();
    assert_eq!(restored_mode & 0o7777, 0o664);
}

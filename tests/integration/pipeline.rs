use crate::common::{mock_install, MAIN_JS_PATCHED, MAIN_JS_UNPATCHED};
use cursor_patcher::{
    BackupManager, Completion, InstallLayout, InstallationLocator, MemoryDiagnostics,
    PatchOrchestrator, PatchOutcome, PipelineError, RunMode, Stage, VersionPolicy,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn orchestrator<'a>(base: &Path, diag: &'a MemoryDiagnostics) -> PatchOrchestrator<'a> {
    let locator = InstallationLocator::new(InstallLayout::Fixed {
        base: base.to_path_buf(),
    });
    let policy = VersionPolicy::from_bounds(Some("0.45.0"), None).unwrap();
    PatchOrchestrator::new(locator, policy, diag)
}

#[test]
fn test_old_version_stops_at_policy() {
    let dir = TempDir::new().unwrap();
    let paths = mock_install(dir.path(), "0.44.0", MAIN_JS_UNPATCHED);
    let diag = MemoryDiagnostics::new();

    let err = orchestrator(dir.path(), &diag)
        .run(RunMode::Patch)
        .unwrap_err();

    assert_eq!(err.stage(), Stage::VersionPolicy);
    assert!(matches!(err, PipelineError::VersionPolicy { .. }));
    assert_eq!(
        fs::read_to_string(&paths.target_path).unwrap(),
        MAIN_JS_UNPATCHED
    );
    assert!(!BackupManager::new(&paths.target_path).backup_exists());
}

#[test]
fn test_supported_version_is_backed_up_and_patched() {
    let dir = TempDir::new().unwrap();
    let original = "async getMachineId(){return a.machineId ?? b.machineId}";
    let paths = mock_install(dir.path(), "0.46.1", original);
    let diag = MemoryDiagnostics::new();

    let completion = orchestrator(dir.path(), &diag)
        .run(RunMode::Patch)
        .unwrap();

    assert!(matches!(
        completion,
        Completion::Done {
            outcome: PatchOutcome::Applied { replacements: 1 },
            ..
        }
    ));
    let patched = fs::read_to_string(&paths.target_path).unwrap();
    assert!(patched.contains("async getMachineId(){return b.machineId}"));

    let backup = BackupManager::new(&paths.target_path);
    assert!(backup.backup_exists());
    assert_eq!(fs::read_to_string(backup.backup_path()).unwrap(), original);
}

#[test]
fn test_minified_bundle_both_accessors() {
    let dir = TempDir::new().unwrap();
    let paths = mock_install(dir.path(), "0.45.0", MAIN_JS_UNPATCHED);
    let diag = MemoryDiagnostics::new();

    let completion = orchestrator(dir.path(), &diag)
        .run(RunMode::Patch)
        .unwrap();

    match completion {
        Completion::Done { outcome, .. } => {
            assert_eq!(outcome, PatchOutcome::Applied { replacements: 2 })
        }
        other => panic!("unexpected completion: {other:?}"),
    }
    assert_eq!(
        fs::read_to_string(&paths.target_path).unwrap(),
        MAIN_JS_PATCHED
    );
}

#[test]
fn test_second_run_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let paths = mock_install(dir.path(), "0.46.1", MAIN_JS_UNPATCHED);
    let diag = MemoryDiagnostics::new();
    let orch = orchestrator(dir.path(), &diag);

    orch.run(RunMode::Patch).unwrap();
    let after_first = fs::read_to_string(&paths.target_path).unwrap();
    let second = orch.run(RunMode::Patch).unwrap();
    let after_second = fs::read_to_string(&paths.target_path).unwrap();

    assert_eq!(after_first, after_second);
    assert!(matches!(
        second,
        Completion::Done {
            outcome: PatchOutcome::AlreadyApplied,
            ..
        }
    ));
}

#[test]
fn test_drift_is_reported_not_failed() {
    let dir = TempDir::new().unwrap();
    let main_js = "async getMachineId(){return await this.lookup()}";
    let paths = mock_install(dir.path(), "0.50.0", main_js);
    let diag = MemoryDiagnostics::new();

    let completion = orchestrator(dir.path(), &diag)
        .run(RunMode::Patch)
        .unwrap();

    // `await this.lookup()` still looks like a patched accessor body
    assert!(matches!(
        completion,
        Completion::Done {
            outcome: PatchOutcome::AlreadyApplied,
            ..
        }
    ));
    assert_eq!(fs::read_to_string(&paths.target_path).unwrap(), main_js);

    let renamed = "async getDeviceIdentifier(){return a??b}";
    fs::write(&paths.target_path, renamed).unwrap();
    let completion = orchestrator(dir.path(), &diag)
        .run(RunMode::Patch)
        .unwrap();
    assert!(matches!(
        completion,
        Completion::Done {
            outcome: PatchOutcome::NoPatternMatched,
            ..
        }
    ));
    assert!(diag.contains("No machine-id accessor pattern found"));
}

#[test]
fn test_patch_then_restore_mode() {
    let dir = TempDir::new().unwrap();
    let paths = mock_install(dir.path(), "0.46.1", MAIN_JS_UNPATCHED);
    let diag = MemoryDiagnostics::new();
    let orch = orchestrator(dir.path(), &diag);

    orch.run(RunMode::Patch).unwrap();
    let completion = orch.run(RunMode::Restore).unwrap();

    assert_eq!(
        completion,
        Completion::RestoreDone {
            paths: paths.clone()
        }
    );
    assert_eq!(
        fs::read_to_string(&paths.target_path).unwrap(),
        MAIN_JS_UNPATCHED
    );
}

#[test]
fn test_missing_manifest_fails_check_before_anything_else() {
    let dir = TempDir::new().unwrap();
    let paths = mock_install(dir.path(), "0.46.1", MAIN_JS_UNPATCHED);
    fs::remove_file(&paths.manifest_path).unwrap();
    let diag = MemoryDiagnostics::new();

    let err = orchestrator(dir.path(), &diag)
        .run(RunMode::Restore)
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Check);
}

#[test]
fn test_probe_after_patch() {
    let dir = TempDir::new().unwrap();
    mock_install(dir.path(), "0.46.1", MAIN_JS_UNPATCHED);
    let diag = MemoryDiagnostics::new();
    let orch = orchestrator(dir.path(), &diag);

    let before = orch.probe().unwrap();
    assert_eq!(before.patch_state, PatchOutcome::Applied { replacements: 2 });
    assert!(!before.backup_present);
    assert!(before.violation.is_none());

    orch.run(RunMode::Patch).unwrap();

    let after = orch.probe().unwrap();
    assert_eq!(after.patch_state, PatchOutcome::AlreadyApplied);
    assert!(after.backup_present);
}

use crate::common::mock_install;
use cursor_patcher::{
    InstallLayout, InstallationLocator, InstallationPaths, LocateError, MemoryDiagnostics,
};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_second_candidate_selected() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("opt/Cursor/resources/app");
    let second = dir.path().join("usr/share/cursor/resources/app");
    let third = dir.path().join("home/me/cursor/resources/app");

    // First exists but holds no manifest; third is a full install too
    fs::create_dir_all(first.join("out")).unwrap();
    fs::write(first.join("out/main.js"), "").unwrap();
    mock_install(&second, "0.46.1", "");
    mock_install(&third, "0.47.0", "");

    let locator = InstallationLocator::new(InstallLayout::Candidates {
        bases: vec![first, second.clone(), third],
    });
    let paths = locator.locate(&MemoryDiagnostics::new()).unwrap();

    assert_eq!(paths, InstallationPaths::under(&second));
    assert!(paths.manifest_path.starts_with(&second));
    assert!(paths.target_path.starts_with(&second));
}

#[test]
fn test_no_candidate_is_not_found() {
    let dir = TempDir::new().unwrap();
    let locator = InstallationLocator::new(InstallLayout::Candidates {
        bases: vec![dir.path().join("a"), dir.path().join("b"), dir.path().join("c")],
    });

    let err = locator.locate(&MemoryDiagnostics::new()).unwrap_err();

    match err {
        LocateError::NotFound { searched } => assert_eq!(searched.len(), 3),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_not_found_message_lists_bases() {
    let err = LocateError::NotFound {
        searched: vec!["/opt/Cursor/resources/app".into(), "/usr/share/cursor/resources/app".into()],
    };
    let message = err.to_string();
    assert!(message.contains("/opt/Cursor/resources/app"));
    assert!(message.contains("/usr/share/cursor/resources/app"));
}

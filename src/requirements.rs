//! Pre-flight checks run before any file is mutated.

use crate::diagnostics::Diagnostics;
use crate::locate::InstallationPaths;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequirementError {
    #[error("File does not exist: {path}")]
    MissingFile { path: PathBuf },

    #[error("No file write permission: {path}")]
    NotWritable { path: PathBuf },
}

impl RequirementError {
    pub fn path(&self) -> &Path {
        match self {
            RequirementError::MissingFile { path } | RequirementError::NotWritable { path } => path,
        }
    }
}

/// Verify that manifest and target both exist and are writable.
///
/// This is best effort: another process can still change either file
/// between the check and the write.
pub fn check(
    paths: &InstallationPaths,
    diagnostics: &dyn Diagnostics,
) -> Result<(), RequirementError> {
    for path in [&paths.manifest_path, &paths.target_path] {
        if !path.is_file() {
            return Err(RequirementError::MissingFile { path: path.clone() });
        }
        if !is_writable(path) {
            return Err(RequirementError::NotWritable { path: path.clone() });
        }
        diagnostics.debug(&format!("{} is present and writable", path.display()));
    }
    Ok(())
}

#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

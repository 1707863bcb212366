//! Sibling backup of the patch target.
//!
//! The backup lives next to the target as `<target>.bak`. There is at most
//! one backup per target: taking a new one replaces the old.

use crate::diagnostics::Diagnostics;
use crate::fsops::{copy_times, FileMetadataSnapshot};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Suffix appended to the target file name.
pub const BACKUP_SUFFIX: &str = ".bak";

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Backup file not found: {path}")]
    BackupNotFound { path: PathBuf },

    #[error("Backup I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Backup at {path} does not match the original after copying")]
    Corrupted { path: PathBuf },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> BackupError + '_ {
    move |source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Creates and restores the backup of one target file.
#[derive(Debug, Clone)]
pub struct BackupManager {
    target_path: PathBuf,
    backup_path: PathBuf,
}

impl BackupManager {
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        let target_path = target_path.into();
        let mut backup = OsString::from(target_path.as_os_str());
        backup.push(BACKUP_SUFFIX);
        Self {
            target_path,
            backup_path: PathBuf::from(backup),
        }
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn backup_exists(&self) -> bool {
        self.backup_path.is_file()
    }

    /// Copy the target to the backup path, replacing any previous backup.
    ///
    /// Content is verified by hash; permission bits, ownership and
    /// timestamps are carried over from the target.
    pub fn backup(&self, diagnostics: &dyn Diagnostics) -> Result<(), BackupError> {
        let snapshot =
            FileMetadataSnapshot::capture(&self.target_path).map_err(io_err(&self.target_path))?;

        if self.backup_path.exists() {
            diagnostics.debug(&format!(
                "Replacing existing backup at {}",
                self.backup_path.display()
            ));
        }

        fs::copy(&self.target_path, &self.backup_path).map_err(io_err(&self.backup_path))?;
        self.verify_copy(&self.target_path, &self.backup_path)?;

        snapshot
            .apply(&self.backup_path)
            .map_err(io_err(&self.backup_path))?;
        copy_times(&self.target_path, &self.backup_path).map_err(io_err(&self.backup_path))?;

        diagnostics.info(&format!("Backed up main.js: {}", self.backup_path.display()));
        Ok(())
    }

    /// Copy the backup back over the target.
    ///
    /// The backup's metadata snapshot is reapplied explicitly so restore and
    /// patch preserve metadata the same way.
    pub fn restore(&self, diagnostics: &dyn Diagnostics) -> Result<(), BackupError> {
        if !self.backup_exists() {
            return Err(BackupError::BackupNotFound {
                path: self.backup_path.clone(),
            });
        }

        let snapshot =
            FileMetadataSnapshot::capture(&self.backup_path).map_err(io_err(&self.backup_path))?;

        fs::copy(&self.backup_path, &self.target_path).map_err(io_err(&self.target_path))?;
        self.verify_copy(&self.backup_path, &self.target_path)?;

        snapshot
            .apply(&self.target_path)
            .map_err(io_err(&self.target_path))?;
        copy_times(&self.backup_path, &self.target_path).map_err(io_err(&self.target_path))?;

        diagnostics.info(&format!(
            "Restored {} from {}",
            self.target_path.display(),
            self.backup_path.display()
        ));
        Ok(())
    }

    fn verify_copy(&self, from: &Path, to: &Path) -> Result<(), BackupError> {
        let expected = fs::read(from).map_err(io_err(from))?;
        let actual = fs::read(to).map_err(io_err(to))?;
        if xxh3_64(&expected) != xxh3_64(&actual) {
            return Err(BackupError::Corrupted {
                path: to.to_path_buf(),
            });
        }
        Ok(())
    }
}

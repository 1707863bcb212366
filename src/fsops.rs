//! Low-level file replacement and metadata preservation.
//!
//! Both the patcher and the backup manager rewrite files that belong to an
//! installed application, often owned by root or another account. They take
//! a [`FileMetadataSnapshot`] before touching the file and reapply it after.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Permission bits and (POSIX) ownership captured from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadataSnapshot {
    pub permissions: fs::Permissions,
    pub owner_uid: Option<u32>,
    pub owner_gid: Option<u32>,
}

impl FileMetadataSnapshot {
    pub fn capture(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let (owner_uid, owner_gid) = owner_of(&metadata);
        Ok(Self {
            permissions: metadata.permissions(),
            owner_uid,
            owner_gid,
        })
    }

    /// Unix mode bits, when the platform has them.
    #[cfg(unix)]
    pub fn mode(&self) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        self.permissions.mode() & 0o7777
    }

    /// Reapply permissions and, on POSIX, ownership to `path`.
    ///
    /// Ownership is only changed when it differs from the snapshot, so an
    /// unprivileged process can rewrite its own files.
    pub fn apply(&self, path: &Path) -> io::Result<()> {
        fs::set_permissions(path, self.permissions.clone())?;
        self.apply_owner(path)
    }

    #[cfg(unix)]
    fn apply_owner(&self, path: &Path) -> io::Result<()> {
        let (uid, gid) = owner_of(&fs::metadata(path)?);
        if uid == self.owner_uid && gid == self.owner_gid {
            return Ok(());
        }
        std::os::unix::fs::chown(path, self.owner_uid, self.owner_gid)
    }

    #[cfg(not(unix))]
    fn apply_owner(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
fn owner_of(metadata: &fs::Metadata) -> (Option<u32>, Option<u32>) {
    use std::os::unix::fs::MetadataExt;
    (Some(metadata.uid()), Some(metadata.gid()))
}

#[cfg(not(unix))]
fn owner_of(_metadata: &fs::Metadata) -> (Option<u32>, Option<u32>) {
    (None, None)
}

/// Copy access and modification times from `from` onto `to`.
pub fn copy_times(from: &Path, to: &Path) -> io::Result<()> {
    let metadata = fs::metadata(from)?;
    let atime = filetime::FileTime::from_last_access_time(&metadata);
    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(to, atime, mtime)
}

/// Replace `path` with `content` via a temp file and rename.
///
/// The temp file goes next to `path` so the rename stays on one filesystem.
/// If the directory refuses a temp file, a system temp file is used instead;
/// should that rename cross devices, the content is copied over `path`.
/// The temp file is removed on every failure path.
pub fn replace_contents(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Path has no parent directory")
    })?;

    match tempfile::NamedTempFile::new_in(parent) {
        Ok(temp) => persist_over(temp, path, content, true),
        Err(e) => {
            tracing::debug!(
                "cannot create temp file in {}: {e}; using system temp dir",
                parent.display()
            );
            persist_over(tempfile::NamedTempFile::new()?, path, content, false)
        }
    }
}

/// Write `content` into `temp` and move it over `path`.
///
/// `same_dir` says whether `temp` shares a directory with `path`; only then
/// is a failed rename final. Otherwise the content is copied over `path`.
fn persist_over(
    mut temp: tempfile::NamedTempFile,
    path: &Path,
    content: &[u8],
    same_dir: bool,
) -> io::Result<()> {
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    match temp.persist(path) {
        Ok(_) => Ok(()),
        Err(e) if !same_dir => {
            // Cross-device rename; `e.file` still owns (and will delete) the temp
            fs::copy(e.file.path(), path)?;
            Ok(())
        }
        Err(e) => Err(e.error),
    }
}

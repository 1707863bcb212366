//! Reads the installed version from `package.json`.

use crate::config::version::{VersionError, VersionTriple};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid version in {path}: {source}")]
    Version {
        path: PathBuf,
        #[source]
        source: VersionError,
    },
}

#[derive(Debug, Deserialize)]
struct PackageManifest {
    version: String,
}

/// Raw `"version"` string declared by the manifest.
pub fn read_version_string(path: &Path) -> Result<String, ManifestError> {
    let contents = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: PackageManifest =
        serde_json::from_str(&contents).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(manifest.version)
}

/// Declared version, parsed as a strict dotted triple.
pub fn read_declared_version(path: &Path) -> Result<VersionTriple, ManifestError> {
    let raw = read_version_string(path)?;
    VersionTriple::parse(&raw).map_err(|source| ManifestError::Version {
        path: path.to_path_buf(),
        source,
    })
}

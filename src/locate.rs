//! Installation discovery.
//!
//! Each supported host OS maps to one [`InstallLayout`]. All layouts resolve
//! to the same [`InstallationPaths`] shape: the `package.json` manifest and
//! the `out/main.js` patch target under an application base directory.

use crate::diagnostics::Diagnostics;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest path relative to the application base.
pub const MANIFEST_SUBPATH: &str = "package.json";
/// Patch target path relative to the application base.
pub const TARGET_SUBPATH: &str = "out/main.js";

const MACOS_BASE: &str = "/Applications/Cursor.app/Contents/Resources/app";
const LINUX_BASES: &[&str] = &["/opt/Cursor/resources/app", "/usr/share/cursor/resources/app"];

/// Environment variable pointing at a relocated Windows installation.
pub const WINDOWS_BASE_ENV: &str = "USERAPPPATH";

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("Unsupported operating system: {os}")]
    UnsupportedPlatform { os: String },

    #[error("Cursor installation not found; searched: {}", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolved manifest and patch target for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationPaths {
    pub manifest_path: PathBuf,
    pub target_path: PathBuf,
}

impl InstallationPaths {
    pub fn under(base: &Path) -> Self {
        Self {
            manifest_path: base.join(MANIFEST_SUBPATH),
            target_path: base.join(TARGET_SUBPATH),
        }
    }
}

/// Host operating systems with a known installation layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Result<Self, LocateError> {
        Self::from_os(env::consts::OS)
    }

    pub fn from_os(os: &str) -> Result<Self, LocateError> {
        match os {
            "macos" => Ok(Platform::MacOs),
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            other => Err(LocateError::UnsupportedPlatform {
                os: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::MacOs => "macOS",
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
        };
        f.write_str(name)
    }
}

/// How the application base directory is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallLayout {
    /// One hard-coded (or operator-supplied) base.
    Fixed { base: PathBuf },
    /// Base derived from the user's application-data root. When it is
    /// missing the operator is told how to link the real installation.
    UserData { base: PathBuf },
    /// First base whose manifest exists wins.
    Candidates { bases: Vec<PathBuf> },
}

impl InstallLayout {
    /// Default layout for `platform`, reading the process environment.
    pub fn for_platform(platform: Platform) -> Self {
        Self::for_platform_with_env(platform, |key| env::var_os(key).map(PathBuf::from))
    }

    /// Default layout for `platform` with an injectable environment lookup.
    pub fn for_platform_with_env<F>(platform: Platform, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        match platform {
            Platform::MacOs => InstallLayout::Fixed {
                base: PathBuf::from(MACOS_BASE),
            },
            Platform::Windows => {
                let base = lookup(WINDOWS_BASE_ENV)
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| {
                        let local = lookup("LOCALAPPDATA")
                            .filter(|p| !p.as_os_str().is_empty())
                            .or_else(|| home::home_dir().map(|h| h.join("AppData").join("Local")))
                            .unwrap_or_default();
                        local
                            .join("Programs")
                            .join("Cursor")
                            .join("resources")
                            .join("app")
                    });
                InstallLayout::UserData { base }
            }
            Platform::Linux => InstallLayout::Candidates {
                bases: LINUX_BASES.iter().map(PathBuf::from).collect(),
            },
        }
    }

    /// Append extra bases to a candidate list. Other layouts are unchanged.
    pub fn with_extra_candidates(mut self, extra: &[PathBuf]) -> Self {
        if let InstallLayout::Candidates { bases } = &mut self {
            bases.extend(extra.iter().cloned());
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct InstallationLocator {
    layout: InstallLayout,
    pause_on_missing_base: bool,
}

impl InstallationLocator {
    pub fn new(layout: InstallLayout) -> Self {
        Self {
            layout,
            pause_on_missing_base: true,
        }
    }

    /// Locator for the running host.
    pub fn for_current_platform() -> Result<Self, LocateError> {
        Ok(Self::new(InstallLayout::for_platform(Platform::current()?)))
    }

    pub fn pause_on_missing_base(mut self, pause: bool) -> Self {
        self.pause_on_missing_base = pause;
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn locate(&self, diagnostics: &dyn Diagnostics) -> Result<InstallationPaths, LocateError> {
        match &self.layout {
            InstallLayout::Fixed { base } => Ok(InstallationPaths::under(base)),
            InstallLayout::UserData { base } => {
                if !base.exists() {
                    self.link_guidance(base, diagnostics);
                }
                Ok(InstallationPaths::under(base))
            }
            InstallLayout::Candidates { bases } => {
                for base in bases {
                    let paths = InstallationPaths::under(base);
                    if paths.manifest_path.exists() {
                        diagnostics.debug(&format!("Found installation at {}", base.display()));
                        return Ok(paths);
                    }
                    diagnostics.debug(&format!("No manifest under {}", base.display()));
                }
                Err(LocateError::NotFound {
                    searched: bases.clone(),
                })
            }
        }
    }

    fn link_guidance(&self, base: &Path, diagnostics: &dyn Diagnostics) {
        diagnostics.warn(&format!(
            "Cursor was not found at {}; it may not be installed in the default path.",
            base.display()
        ));
        diagnostics.info("Create a directory link to the real installation, for example:");
        diagnostics.info(
            r#"cmd /c mklink /d "C:\Users\<username>\AppData\Local\Programs\Cursor" "D:\SoftWare\cursor""#,
        );
        diagnostics.info(&format!(
            "Alternatively set {} to the installation's resources\\app directory.",
            WINDOWS_BASE_ENV
        ));
        if self.pause_on_missing_base {
            diagnostics.acknowledge("Press Enter to continue...");
        }
    }
}

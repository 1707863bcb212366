use crate::config::version::{VersionError, VersionPolicy};
use crate::locate::{InstallLayout, InstallationLocator, LocateError, Platform};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PatcherConfig {
    pub policy: PolicyConfig,
    pub install: InstallConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub min_version: Option<String>,
    pub max_version: Option<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_version: Some(VersionPolicy::DEFAULT_MIN_VERSION.to_string()),
            max_version: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallConfig {
    /// Use this application base instead of the platform default.
    pub base_dir: Option<PathBuf>,
    /// Extra bases tried after the built-in Linux candidates.
    pub extra_candidates: Vec<PathBuf>,
    /// Wait for Enter after printing link guidance on Windows.
    pub pause_on_missing_base: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            extra_candidates: Vec::new(),
            pause_on_missing_base: true,
        }
    }
}

impl PatcherConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if let Err(source) = self.version_policy() {
            issues.push(ValidationIssue::InvalidPolicy { source });
        }

        if let Some(base) = &self.install.base_dir {
            if base.as_os_str().is_empty() {
                issues.push(ValidationIssue::EmptyPath {
                    field: "install.base_dir",
                });
            }
        }
        if self
            .install
            .extra_candidates
            .iter()
            .any(|p| p.as_os_str().is_empty())
        {
            issues.push(ValidationIssue::EmptyPath {
                field: "install.extra_candidates",
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn version_policy(&self) -> Result<VersionPolicy, VersionError> {
        VersionPolicy::from_bounds(
            self.policy.min_version.as_deref(),
            self.policy.max_version.as_deref(),
        )
    }

    /// Locator for the running host. An explicit base directory skips
    /// platform detection entirely.
    pub fn locator(&self) -> Result<InstallationLocator, LocateError> {
        if let Some(locator) = self.fixed_locator() {
            return Ok(locator);
        }
        Ok(self.locator_for(Platform::current()?))
    }

    /// Locator for `platform`; an explicit base wins over the platform layout.
    pub fn locator_for(&self, platform: Platform) -> InstallationLocator {
        self.fixed_locator().unwrap_or_else(|| {
            self.finish_locator(
                InstallLayout::for_platform(platform)
                    .with_extra_candidates(&self.install.extra_candidates),
            )
        })
    }

    fn fixed_locator(&self) -> Option<InstallationLocator> {
        self.install.base_dir.as_ref().map(|base| {
            self.finish_locator(InstallLayout::Fixed { base: base.clone() })
        })
    }

    fn finish_locator(&self, layout: InstallLayout) -> InstallationLocator {
        InstallationLocator::new(layout).pause_on_missing_base(self.install.pause_on_missing_base)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    InvalidPolicy { source: VersionError },
    EmptyPath { field: &'static str },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::InvalidPolicy { source } => {
                write!(f, "invalid version policy: {source}")
            }
            ValidationIssue::EmptyPath { field } => write!(f, "'{field}' contains an empty path"),
        }
    }
}

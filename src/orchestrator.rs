//! Pipeline sequencing locate, check, version gate, backup and patch.
//!
//! ```text
//! Start -> Located -> Checked -> RestoreDone                           (restore mode)
//!                             -> VersionRead -> PolicyOk -> BackedUp -> Patched -> Done
//! ```
//!
//! Any stage may end the run in `Failed(stage)`; nothing is retried or
//! rolled back. After a failure at or past the backup stage the backup stays
//! on disk for a manual or restore-mode undo.

use crate::backup::{BackupError, BackupManager};
use crate::config::version::{BoundViolation, VersionPolicy, VersionTriple};
use crate::diagnostics::Diagnostics;
use crate::locate::{InstallationLocator, InstallationPaths, LocateError};
use crate::manifest::{read_declared_version, ManifestError};
use crate::patcher::{inspect, PatchError, PatchOutcome, SourcePatcher};
use crate::requirements::{self, RequirementError};
use std::fmt;
use std::fs;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Patch,
    Restore,
}

/// Pipeline stages, named as they appear in failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Locate,
    Check,
    Restore,
    VersionRead,
    VersionPolicy,
    Backup,
    Patch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Locate => "locate",
            Stage::Check => "check",
            Stage::Restore => "restore",
            Stage::VersionRead => "version-read",
            Stage::VersionPolicy => "version-policy",
            Stage::Backup => "backup",
            Stage::Patch => "patch",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Failed(stage)` with its cause.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Check(#[from] RequirementError),

    #[error(transparent)]
    Restore(BackupError),

    #[error(transparent)]
    VersionRead(#[from] ManifestError),

    #[error("Version {version} does not meet requirements: {violation}")]
    VersionPolicy {
        version: VersionTriple,
        violation: BoundViolation,
    },

    #[error(transparent)]
    Backup(BackupError),

    #[error(transparent)]
    Patch(#[from] PatchError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Locate(_) => Stage::Locate,
            PipelineError::Check(_) => Stage::Check,
            PipelineError::Restore(_) => Stage::Restore,
            PipelineError::VersionRead(_) => Stage::VersionRead,
            PipelineError::VersionPolicy { .. } => Stage::VersionPolicy,
            PipelineError::Backup(_) => Stage::Backup,
            PipelineError::Patch(_) => Stage::Patch,
        }
    }

    pub fn is_unsupported_platform(&self) -> bool {
        matches!(
            self,
            PipelineError::Locate(LocateError::UnsupportedPlatform { .. })
        )
    }

    /// The installed version is newer than the patchable range.
    pub fn is_version_too_new(&self) -> bool {
        matches!(
            self,
            PipelineError::VersionPolicy {
                violation: BoundViolation::AboveMaximum(_),
                ..
            }
        )
    }
}

/// Successful end states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    RestoreDone {
        paths: InstallationPaths,
    },
    Done {
        paths: InstallationPaths,
        version: VersionTriple,
        outcome: PatchOutcome,
    },
}

/// Read-only view of an installation, used by `status` and dry runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationStatus {
    pub paths: InstallationPaths,
    pub version: VersionTriple,
    pub violation: Option<BoundViolation>,
    pub patch_state: PatchOutcome,
    pub backup_present: bool,
}

enum State {
    Start,
    Located(InstallationPaths),
    Checked(InstallationPaths),
    VersionRead(InstallationPaths, VersionTriple),
    PolicyOk(InstallationPaths, VersionTriple),
    BackedUp(InstallationPaths, VersionTriple),
    Patched(InstallationPaths, VersionTriple, PatchOutcome),
}

enum Step {
    Next(State),
    Finished(Completion),
}

pub struct PatchOrchestrator<'a> {
    locator: InstallationLocator,
    policy: VersionPolicy,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> PatchOrchestrator<'a> {
    pub fn new(
        locator: InstallationLocator,
        policy: VersionPolicy,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            locator,
            policy,
            diagnostics,
        }
    }

    pub fn policy(&self) -> &VersionPolicy {
        &self.policy
    }

    /// Run the pipeline to `Done`/`RestoreDone` or the first failure.
    pub fn run(&self, mode: RunMode) -> Result<Completion, PipelineError> {
        self.diagnostics.info("Starting script execution...");

        let mut state = State::Start;
        loop {
            let step = self.step(state, mode).map_err(|e| {
                self.diagnostics
                    .error(&format!("Stage '{}' failed: {}", e.stage(), e));
                e
            })?;
            match step {
                Step::Next(next) => state = next,
                Step::Finished(completion) => return Ok(completion),
            }
        }
    }

    fn step(&self, state: State, mode: RunMode) -> Result<Step, PipelineError> {
        let diag = self.diagnostics;
        let next = match state {
            State::Start => {
                let paths = self.locator.locate(diag)?;
                diag.debug(&format!("Manifest: {}", paths.manifest_path.display()));
                diag.debug(&format!("Target: {}", paths.target_path.display()));
                State::Located(paths)
            }
            State::Located(paths) => {
                requirements::check(&paths, diag)?;
                State::Checked(paths)
            }
            State::Checked(paths) => match mode {
                RunMode::Restore => {
                    BackupManager::new(&paths.target_path)
                        .restore(diag)
                        .map_err(PipelineError::Restore)?;
                    diag.info("Backup restore completed");
                    return Ok(Step::Finished(Completion::RestoreDone { paths }));
                }
                RunMode::Patch => {
                    let version = read_declared_version(&paths.manifest_path)?;
                    diag.info(&format!("Current Cursor version: {}", version));
                    State::VersionRead(paths, version)
                }
            },
            State::VersionRead(paths, version) => {
                if let Err(violation) = self.policy.check(&version, diag) {
                    return Err(PipelineError::VersionPolicy { version, violation });
                }
                diag.info("Version check passed, preparing to modify files");
                State::PolicyOk(paths, version)
            }
            State::PolicyOk(paths, version) => {
                BackupManager::new(&paths.target_path)
                    .backup(diag)
                    .map_err(PipelineError::Backup)?;
                State::BackedUp(paths, version)
            }
            State::BackedUp(paths, version) => {
                let outcome = SourcePatcher::new(&paths.target_path).patch(diag)?;
                State::Patched(paths, version, outcome)
            }
            State::Patched(paths, version, outcome) => {
                diag.info("Script execution completed");
                return Ok(Step::Finished(Completion::Done {
                    paths,
                    version,
                    outcome,
                }));
            }
        };
        Ok(Step::Next(next))
    }

    /// Locate, check and inspect without modifying anything.
    ///
    /// Policy violations are reported in the status rather than as errors.
    pub fn probe(&self) -> Result<InstallationStatus, PipelineError> {
        let diag = self.diagnostics;
        let paths = self.locator.locate(diag)?;
        requirements::check(&paths, diag)?;
        let version = read_declared_version(&paths.manifest_path)?;
        let content = fs::read_to_string(&paths.target_path).map_err(|source| {
            PipelineError::Patch(PatchError::IoFailure {
                path: paths.target_path.clone(),
                source,
            })
        })?;

        Ok(InstallationStatus {
            violation: self.policy.violation(&version),
            patch_state: inspect(&content),
            backup_present: BackupManager::new(&paths.target_path).backup_exists(),
            paths,
            version,
        })
    }
}

//! Cursor Patcher: machine-id accessor patching for Cursor installations
//!
//! Finds the installed Cursor application, checks its declared version
//! against a compatibility policy, backs up `out/main.js` and rewrites the
//! machine-id accessors so they return their fallback value.
//!
//! # Architecture
//!
//! Components are leaf-first and each takes an injected [`Diagnostics`]
//! sink instead of logging globally:
//!
//! - [`config::version`]: dotted-triple versions and inclusive bounds
//! - [`locate`]: per-OS installation layouts
//! - [`requirements`]: existence and write-permission checks
//! - [`backup`]: `<target>.bak` creation and restore
//! - [`patcher`]: the fixed rewrite rules and in-place replacement
//! - [`orchestrator`]: the state machine tying them together
//!
//! # Safety
//!
//! - Version gate runs before any file is touched
//! - Backup is taken and hash-verified before patching
//! - Replacement goes through a temp file in the target's directory
//! - Permission bits and POSIX ownership are restored after every rewrite
//! - Idempotent: patching an already patched file is a no-op
//!
//! # Example
//!
//! ```no_run
//! use cursor_patcher::{
//!     InstallationLocator, PatchOrchestrator, RunMode, TracingDiagnostics, VersionPolicy,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let diagnostics = TracingDiagnostics::default();
//! let locator = InstallationLocator::for_current_platform()?;
//! let policy = VersionPolicy::from_bounds(Some("0.45.0"), None)?;
//!
//! match PatchOrchestrator::new(locator, policy, &diagnostics).run(RunMode::Patch) {
//!     Ok(done) => println!("{:?}", done),
//!     Err(e) => eprintln!("failed at {}: {}", e.stage(), e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod diagnostics;
pub mod fsops;
pub mod locate;
pub mod manifest;
pub mod orchestrator;
pub mod patcher;
pub mod requirements;

// Re-exports
pub use backup::{BackupError, BackupManager};
pub use config::{
    load_from_path, load_from_str, satisfies, ConfigError, PatcherConfig, VersionError,
    VersionPolicy, VersionTriple,
};
pub use diagnostics::{Diagnostics, Level, MemoryDiagnostics, TracingDiagnostics};
pub use fsops::FileMetadataSnapshot;
pub use locate::{InstallLayout, InstallationLocator, InstallationPaths, LocateError, Platform};
pub use manifest::ManifestError;
pub use orchestrator::{
    Completion, InstallationStatus, PatchOrchestrator, PipelineError, RunMode, Stage,
};
pub use patcher::{PatchError, PatchOutcome, PatchPreview, PatchRule, SourcePatcher};
pub use requirements::RequirementError;

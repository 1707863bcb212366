pub mod loader;
pub mod schema;
pub mod version;

pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{InstallConfig, PatcherConfig, PolicyConfig, ValidationError, ValidationIssue};
pub use version::{satisfies, BoundViolation, VersionError, VersionPolicy, VersionTriple};

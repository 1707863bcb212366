//! Machine-id accessor patching for `out/main.js`.
//!
//! Cursor's bundled main process exposes two accessors shaped like
//!
//! ```text
//! async getMachineId(){return someLookup() ?? fallbackId}
//! ```
//!
//! Each [`PatchRule`] rewrites one of them to return the fallback directly.
//! The two shapes are a contract with upstream code generation: when neither
//! matches, [`PatchOutcome::NoPatternMatched`] lets the caller notice drift.

use crate::diagnostics::Diagnostics;
use crate::fsops::{replace_contents, FileMetadataSnapshot};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Failed to patch {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PatchError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> PatchError + '_ {
        move |source| PatchError::IoFailure {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One accessor rewrite: `match_pattern` to `replacement`.
#[derive(Debug)]
pub struct PatchRule {
    pub method: &'static str,
    pub match_pattern: Regex,
    pub replacement: String,
    /// Shape of the accessor once the rule has been applied.
    applied_pattern: Regex,
}

impl PatchRule {
    fn accessor(method: &'static str) -> Self {
        let name = regex::escape(method);
        let match_pattern = Regex::new(&format!(
            r"async {name}\(\)\{{return [^?}}]+\?\?\s*([^}}]+)\}}"
        ))
        .expect("accessor pattern is valid");
        let applied_pattern = Regex::new(&format!(r"async {name}\(\)\{{return [^?}}]+\}}"))
            .expect("applied accessor pattern is valid");

        Self {
            method,
            match_pattern,
            replacement: format!("async {method}(){{return ${{1}}}}"),
            applied_pattern,
        }
    }

    pub fn id(&self) -> &'static str {
        self.method
    }

    /// Apply to `content`, returning the new text and the number of rewrites.
    pub fn apply(&self, content: &str) -> (String, usize) {
        let count = self.match_pattern.find_iter(content).count();
        if count == 0 {
            return (content.to_string(), 0);
        }
        let replaced = self
            .match_pattern
            .replace_all(content, self.replacement.as_str())
            .into_owned();
        (replaced, count)
    }

    pub fn state(&self, content: &str) -> RuleState {
        if self.match_pattern.is_match(content) {
            RuleState::Unpatched
        } else if self.applied_pattern.is_match(content) {
            RuleState::Applied
        } else {
            RuleState::Missing
        }
    }
}

/// The fixed rule set, applied in this order.
pub static PATCH_RULES: Lazy<Vec<PatchRule>> = Lazy::new(|| {
    vec![
        PatchRule::accessor("getMachineId"),
        PatchRule::accessor("getMacMachineId"),
    ]
});

/// Where one rule stands against a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    /// Original fallback expression still present.
    Unpatched,
    /// Accessor present and already returning the fallback directly.
    Applied,
    /// Accessor not found in either shape.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome distinguishes a real patch from pattern drift"]
pub enum PatchOutcome {
    /// At least one accessor was rewritten.
    Applied { replacements: usize },
    /// Every accessor found is already patched.
    AlreadyApplied,
    /// Neither accessor shape occurs in the file.
    NoPatternMatched,
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOutcome::Applied { replacements } => {
                write!(f, "patched ({} accessor(s) rewritten)", replacements)
            }
            PatchOutcome::AlreadyApplied => write!(f, "already patched"),
            PatchOutcome::NoPatternMatched => write!(f, "no known accessor pattern found"),
        }
    }
}

/// Result of running the rule set over text without touching disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPreview {
    pub original: String,
    pub patched: String,
    pub outcome: PatchOutcome,
}

/// Run every rule over `content` in order.
pub fn transform(content: &str) -> (String, PatchOutcome) {
    let mut current = content.to_string();
    let mut replacements = 0;
    for rule in PATCH_RULES.iter() {
        let (next, count) = rule.apply(&current);
        current = next;
        replacements += count;
    }

    let outcome = if replacements > 0 {
        PatchOutcome::Applied { replacements }
    } else {
        classify(content)
    };
    (current, outcome)
}

/// Classify `content` without rewriting it.
pub fn inspect(content: &str) -> PatchOutcome {
    let replacements: usize = PATCH_RULES
        .iter()
        .map(|rule| rule.match_pattern.find_iter(content).count())
        .sum();
    if replacements > 0 {
        return PatchOutcome::Applied { replacements };
    }
    classify(content)
}

fn classify(content: &str) -> PatchOutcome {
    let any_applied = PATCH_RULES
        .iter()
        .any(|rule| rule.state(content) == RuleState::Applied);
    if any_applied {
        PatchOutcome::AlreadyApplied
    } else {
        PatchOutcome::NoPatternMatched
    }
}

/// Rewrites a target file in place.
#[derive(Debug, Clone)]
pub struct SourcePatcher {
    target_path: PathBuf,
}

impl SourcePatcher {
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            target_path: target_path.into(),
        }
    }

    /// Compute the patched text without writing it.
    pub fn preview(&self) -> Result<PatchPreview, PatchError> {
        let original =
            fs::read_to_string(&self.target_path).map_err(PatchError::io(&self.target_path))?;
        let (patched, outcome) = transform(&original);
        Ok(PatchPreview {
            original,
            patched,
            outcome,
        })
    }

    /// Patch the target, preserving its permission bits and ownership.
    ///
    /// Idempotent: a second run finds nothing to rewrite and leaves the file
    /// untouched.
    pub fn patch(&self, diagnostics: &dyn Diagnostics) -> Result<PatchOutcome, PatchError> {
        let path = self.target_path.as_path();
        let snapshot = FileMetadataSnapshot::capture(path).map_err(PatchError::io(path))?;

        let preview = self.preview()?;
        match &preview.outcome {
            PatchOutcome::Applied { replacements } => {
                replace_contents(path, preview.patched.as_bytes()).map_err(PatchError::io(path))?;
                snapshot.apply(path).map_err(PatchError::io(path))?;
                diagnostics.info(&format!(
                    "File modification successful: {} accessor(s) rewritten in {}",
                    replacements,
                    path.display()
                ));
            }
            PatchOutcome::AlreadyApplied => {
                diagnostics.info(&format!("{} is already patched", path.display()));
            }
            PatchOutcome::NoPatternMatched => {
                diagnostics.warn(&format!(
                    "No machine-id accessor pattern found in {}; the file layout may have changed",
                    path.display()
                ));
            }
        }

        Ok(preview.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemoryDiagnostics;

    const UNPATCHED: &str = concat!(
        "class A{async getMachineId(){return this.a.machineId ?? this.b.machineId}",
        "async getMacMachineId(){return this.m??this.fallbackMac}}"
    );
    const PATCHED: &str = concat!(
        "class A{async getMachineId(){return this.b.machineId}",
        "async getMacMachineId(){return this.fallbackMac}}"
    );

    #[test]
    fn test_rule_replaces_fallback() {
        let rule = PatchRule::accessor("getMachineId");
        let (out, count) = rule.apply("async getMachineId(){return a.machineId ?? b.machineId}");
        assert_eq!(out, "async getMachineId(){return b.machineId}");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_rule_without_match_is_noop() {
        let rule = PatchRule::accessor("getMachineId");
        let (out, count) = rule.apply("function unrelated(){return 1}");
        assert_eq!(out, "function unrelated(){return 1}");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_rule_does_not_cross_method_bodies() {
        let rule = PatchRule::accessor("getMachineId");
        let content = "async getMachineId(){return id}x(){return a??b}";
        let (out, count) = rule.apply(content);
        assert_eq!(count, 0);
        assert_eq!(out, content);
    }

    #[test]
    fn test_mac_rule_leaves_generic_accessor_alone() {
        let rule = PatchRule::accessor("getMacMachineId");
        let content = "async getMachineId(){return a??b}";
        assert_eq!(rule.apply(content).1, 0);
    }

    #[test]
    fn test_transform_both_rules() {
        let (out, outcome) = transform(UNPATCHED);
        assert_eq!(out, PATCHED);
        assert_eq!(outcome, PatchOutcome::Applied { replacements: 2 });
    }

    #[test]
    fn test_transform_is_idempotent() {
        let (once, _) = transform(UNPATCHED);
        let (twice, outcome) = transform(&once);
        assert_eq!(once, twice);
        assert_eq!(outcome, PatchOutcome::AlreadyApplied);
    }

    #[test]
    fn test_transform_reports_drift() {
        let (out, outcome) = transform("async getDeviceId(){return x}");
        assert_eq!(out, "async getDeviceId(){return x}");
        assert_eq!(outcome, PatchOutcome::NoPatternMatched);
    }

    #[test]
    fn test_inspect_matches_transform() {
        assert_eq!(inspect(UNPATCHED), PatchOutcome::Applied { replacements: 2 });
        assert_eq!(inspect(PATCHED), PatchOutcome::AlreadyApplied);
        assert_eq!(inspect(""), PatchOutcome::NoPatternMatched);
    }

    #[test]
    fn test_rule_states() {
        let rule = &PATCH_RULES[0];
        assert_eq!(rule.id(), "getMachineId");
        assert_eq!(rule.state(UNPATCHED), RuleState::Unpatched);
        assert_eq!(rule.state(PATCHED), RuleState::Applied);
        assert_eq!(rule.state("nothing"), RuleState::Missing);
    }

    #[test]
    fn test_patch_file_twice() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("main.js");
        fs::write(&target, UNPATCHED).unwrap();
        let patcher = SourcePatcher::new(&target);
        let diag = MemoryDiagnostics::new();

        let first = patcher.patch(&diag).unwrap();
        let after_first = fs::read_to_string(&target).unwrap();
        let second = patcher.patch(&diag).unwrap();
        let after_second = fs::read_to_string(&target).unwrap();

        assert_eq!(first, PatchOutcome::Applied { replacements: 2 });
        assert_eq!(second, PatchOutcome::AlreadyApplied);
        assert_eq!(after_first, PATCHED);
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_patch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let patcher = SourcePatcher::new(dir.path().join("main.js"));
        let err = patcher.patch(&MemoryDiagnostics::new()).unwrap_err();
        assert!(matches!(err, PatchError::IoFailure { .. }));
    }

    #[test]
    fn test_patch_non_utf8_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("main.js");
        fs::write(&target, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = SourcePatcher::new(&target)
            .patch(&MemoryDiagnostics::new())
            .unwrap_err();
        assert!(matches!(err, PatchError::IoFailure { .. }));
        assert_eq!(fs::read(&target).unwrap(), vec![0xff, 0xfe, 0x00, 0x80]);
    }

    #[test]
    fn test_patch_warns_on_drift() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("main.js");
        fs::write(&target, "module.exports={}").unwrap();
        let diag = MemoryDiagnostics::new();

        let outcome = SourcePatcher::new(&target).patch(&diag).unwrap();

        assert_eq!(outcome, PatchOutcome::NoPatternMatched);
        assert!(diag.contains("No machine-id accessor pattern found"));
    }

    #[test]
    #[cfg(unix)]
    fn test_patch_preserves_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("main.js");
        fs::write(&target, UNPATCHED).unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o644)).unwrap();

        let _ = SourcePatcher::new(&target)
            .patch(&MemoryDiagnostics::new())
            .unwrap();

        let mode = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o644);
        // No temp files left next to the target
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}

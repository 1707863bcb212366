//! Version gating for the patch target
//!
//! Installed versions are plain dotted triples ("0.45.0"). A policy holds
//! optional inclusive bounds; anything that fails to parse fails closed.

use crate::diagnostics::Diagnostics;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$").expect("version pattern is valid"));

/// Errors during version parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// String is not `<major>.<minor>.<patch>` with numeric components
    InvalidFormat { value: String },
    /// Lower bound is above the upper bound
    EmptyRange { min: VersionTriple, max: VersionTriple },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidFormat { value } => {
                write!(f, "invalid version number format: '{}'", value)
            }
            VersionError::EmptyRange { min, max } => {
                write!(
                    f,
                    "minimum version {} is greater than maximum version {}",
                    min, max
                )
            }
        }
    }
}

impl std::error::Error for VersionError {}

/// A `(major, minor, patch)` version, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTriple {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl VersionTriple {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a strict dotted triple.
    ///
    /// ```
    /// use cursor_patcher::config::version::VersionTriple;
    ///
    /// assert_eq!(VersionTriple::parse("1.2.3").unwrap(), VersionTriple::new(1, 2, 3));
    /// assert!(VersionTriple::parse("1.2").is_err());
    /// assert!(VersionTriple::parse("a.b.c").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidFormat {
            value: value.to_string(),
        };

        if !VERSION_PATTERN.is_match(value) {
            return Err(invalid());
        }

        let mut parts = value.split('.').map(|part| part.parse::<u64>());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch))) => {
                Ok(Self::new(major, minor, patch))
            }
            // Digits only, so this is a component too large for u64
            _ => Err(invalid()),
        }
    }
}

impl FromStr for VersionTriple {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Which bound a version fell outside of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundViolation {
    BelowMinimum(VersionTriple),
    AboveMaximum(VersionTriple),
}

impl fmt::Display for BoundViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundViolation::BelowMinimum(min) => {
                write!(f, "less than the minimum requirement {}", min)
            }
            BoundViolation::AboveMaximum(max) => {
                write!(f, "greater than the maximum requirement {}", max)
            }
        }
    }
}

/// Inclusive version bounds. Absent bounds impose no constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionPolicy {
    pub min: Option<VersionTriple>,
    pub max: Option<VersionTriple>,
}

impl VersionPolicy {
    /// Lowest release whose `main.js` carries the patchable accessor shape.
    pub const DEFAULT_MIN_VERSION: VersionTriple = VersionTriple::new(0, 45, 0);

    pub fn new(
        min: Option<VersionTriple>,
        max: Option<VersionTriple>,
    ) -> Result<Self, VersionError> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(VersionError::EmptyRange { min, max });
            }
        }
        Ok(Self { min, max })
    }

    /// Build a policy from optional string bounds; an empty string means "no bound".
    pub fn from_bounds(min: Option<&str>, max: Option<&str>) -> Result<Self, VersionError> {
        Self::new(parse_bound(min)?, parse_bound(max)?)
    }

    pub fn allows(&self, version: &VersionTriple) -> bool {
        self.violation(version).is_none()
    }

    pub fn violation(&self, version: &VersionTriple) -> Option<BoundViolation> {
        if let Some(min) = self.min {
            if *version < min {
                return Some(BoundViolation::BelowMinimum(min));
            }
        }
        if let Some(max) = self.max {
            if *version > max {
                return Some(BoundViolation::AboveMaximum(max));
            }
        }
        None
    }

    /// Like [`violation`](Self::violation), but reports a rejection through
    /// `diagnostics`.
    pub fn check(
        &self,
        version: &VersionTriple,
        diagnostics: &dyn Diagnostics,
    ) -> Result<(), BoundViolation> {
        match self.violation(version) {
            None => Ok(()),
            Some(violation) => {
                diagnostics.error(&format!("Version number {} is {}", version, violation));
                Err(violation)
            }
        }
    }
}

impl fmt::Display for VersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (None, None) => write!(f, "any version"),
            (Some(min), None) => write!(f, ">= {}", min),
            (None, Some(max)) => write!(f, "<= {}", max),
            (Some(min), Some(max)) => write!(f, ">= {}, <= {}", min, max),
        }
    }
}

fn parse_bound(bound: Option<&str>) -> Result<Option<VersionTriple>, VersionError> {
    match bound {
        None | Some("") => Ok(None),
        Some(value) => VersionTriple::parse(value).map(Some),
    }
}

/// Check a version string against optional string bounds.
///
/// Malformed input in any of the three arguments is reported through
/// `diagnostics` and yields `false`.
pub fn satisfies(
    version: &str,
    min_version: Option<&str>,
    max_version: Option<&str>,
    diagnostics: &dyn Diagnostics,
) -> bool {
    let checked = VersionTriple::parse(version).and_then(|parsed| {
        VersionPolicy::from_bounds(min_version, max_version).map(|policy| (parsed, policy))
    });

    match checked {
        Ok((parsed, policy)) => policy.check(&parsed, diagnostics).is_ok(),
        Err(e) => {
            diagnostics.error(&format!("Version check failed: {}", e));
            false
        }
    }
}

//! Error types for manifest loading and schema validation

use hookwarden_common::{ErrorSeverity, Severity};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A single schema rule that the manifest broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Location inside the manifest, e.g. `hooks[2].timeout`
    pub location: String,
    /// What is wrong with the value at that location
    pub message: String,
}

impl SchemaViolation {
    pub(crate) fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// The manifest failed schema validation.
///
/// Carries every violation found, not only the first, so an operator can fix
/// the manifest in one pass. The manifest is unusable while any violation remains.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SchemaError {
    /// All violations found, in manifest order
    pub violations: Vec<SchemaViolation>,
}

impl SchemaError {
    pub(crate) fn single(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![SchemaViolation::new(location, message)],
        }
    }

    /// One-line hint for the operator.
    pub fn remediation(&self) -> &'static str {
        "fix the listed manifest entries; no hook runs until the whole manifest validates"
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "manifest failed schema validation ({} violation{})",
            self.violations.len(),
            if self.violations.len() == 1 { "" } else { "s" }
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

impl Severity for SchemaError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Critical
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No manifest file could be found
    #[error("Hook manifest not found (looked in {searched})")]
    ManifestNotFound {
        /// Human readable list of searched locations
        searched: String,
    },

    /// Failed to read the manifest file
    #[error("Failed to read hook manifest {path}: {source}")]
    FileRead {
        /// Manifest path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The manifest was read but is not valid
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl Severity for ConfigError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            ConfigError::ManifestNotFound { .. } | ConfigError::FileRead { .. } => {
                ErrorSeverity::Error
            }
            ConfigError::Schema(e) => e.severity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_all_violations() {
        let err = SchemaError {
            violations: vec![
                SchemaViolation::new("hooks[0].name", "must match ^[a-z0-9-]+$"),
                SchemaViolation::new("hooks[1].timeout", "must be between 1 and 600"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("2 violations"));
        assert!(text.contains("hooks[0].name"));
        assert!(text.contains("hooks[1].timeout"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}

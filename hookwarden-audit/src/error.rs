//! Error types for the audit log.

use hookwarden_common::{ErrorSeverity, Severity};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

/// Errors raised while writing or reading the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The log file could not be opened, locked, written, or synced
    #[error("Audit log {path} could not be written: {source}")]
    Write {
        /// File being written
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Rotation failed while renaming or deleting files
    #[error("Audit log rotation failed for {path}: {source}")]
    Rotate {
        /// File being rotated
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The log could not be read back
    #[error("Audit log {path} could not be read: {source}")]
    Read {
        /// File being read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// A record could not be serialized
    #[error("Audit record could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl AuditError {
    /// One-line hint for the operator.
    pub fn remediation(&self) -> &'static str {
        match self {
            AuditError::Write { .. } | AuditError::Rotate { .. } => {
                "check that the audit log directory exists, is writable, and the disk is not full"
            }
            AuditError::Read { .. } => "check the audit log path and file permissions",
            AuditError::Serialize(_) => "report this as a bug; audit records must always serialize",
        }
    }
}

impl Severity for AuditError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            AuditError::Read { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Critical,
        }
    }
}

//! CLI error type and its mapping to exit codes.

use crate::exit_codes::{EXIT_FAILURE, EXIT_MANIFEST_INVALID};
use hookwarden_audit::AuditError;
use hookwarden_config::ConfigError;
use thiserror::Error;

/// Result type for command handlers.
pub type CliResult<T> = Result<T, CliError>;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CliError {
    /// Manifest missing, unreadable, or invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Audit log unusable
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// The event payload could not be read
    #[error("failed to read payload from {origin}: {source}")]
    Payload {
        /// `stdin` or the file path
        origin: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// `--since` could not be parsed
    #[error("invalid --since value '{0}': expected YYYY-MM-DD or RFC 3339")]
    InvalidSince(String),

    /// The current directory could not be determined
    #[error("cannot determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    /// JSON output failed
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => EXIT_MANIFEST_INVALID,
            _ => EXIT_FAILURE,
        }
    }

    /// One-line hint, when there is one.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            CliError::Config(ConfigError::Schema(e)) => Some(e.remediation()),
            CliError::Config(ConfigError::ManifestNotFound { .. }) => {
                Some("create .hookwarden/hooks.yaml or pass --manifest")
            }
            CliError::Audit(e) => Some(e.remediation()),
            _ => None,
        }
    }
}

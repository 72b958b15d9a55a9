//! Error taxonomy for hook pre-flight and execution.

use hookwarden_audit::AuditError;
use hookwarden_common::{ErrorSeverity, Severity};
use hookwarden_config::SchemaError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias for hook operations.
pub type HookResult<T> = std::result::Result<T, HookError>;

/// A declared script path that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathViolation {
    /// The declared path contains a `..` segment
    #[error("script path '{declared}' contains '..' segments")]
    Traversal {
        /// Path as declared in the manifest
        declared: PathBuf,
    },

    /// The declared path is absolute
    #[error("script path '{declared}' is absolute")]
    Absolute {
        /// Path as declared in the manifest
        declared: PathBuf,
    },

    /// The path does not exist, or the hooks root itself is missing
    #[error("script '{path}' does not exist")]
    NotFound {
        /// Path that could not be resolved
        path: PathBuf,
    },

    /// The canonical path lies outside the hooks root, e.g. through a symlink
    #[error("script '{declared}' resolves to '{resolved}', outside the hooks directory")]
    OutsideRoot {
        /// Path as declared in the manifest
        declared: PathBuf,
        /// Canonical path after symlink resolution
        resolved: PathBuf,
    },

    /// The path is not a regular file with the owner-execute bit set
    #[error("script '{path}' is not an executable file")]
    NotExecutable {
        /// Canonical path
        path: PathBuf,
    },
}

impl PathViolation {
    /// Short machine-friendly kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PathViolation::Traversal { .. } => "traversal",
            PathViolation::Absolute { .. } => "absolute",
            PathViolation::NotFound { .. } => "not_found",
            PathViolation::OutsideRoot { .. } => "outside_root",
            PathViolation::NotExecutable { .. } => "not_executable",
        }
    }

    /// One-line hint for the operator.
    pub fn remediation(&self) -> &'static str {
        match self {
            PathViolation::Traversal { .. } | PathViolation::Absolute { .. } => {
                "script outside hooks directory - use a relative path without '..' segments"
            }
            PathViolation::OutsideRoot { .. } => {
                "script resolves outside the hooks directory - replace the symlink with the script itself"
            }
            PathViolation::NotFound { .. } => {
                "create the script under the hooks directory or fix the path in the manifest"
            }
            PathViolation::NotExecutable { .. } => "make the script executable: chmod u+x <script>",
        }
    }
}

/// A declared working directory that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CwdViolation {
    /// The declared directory is absolute
    #[error("working directory '{declared}' is absolute")]
    Absolute {
        /// Directory as declared in the manifest
        declared: PathBuf,
    },

    /// The directory does not exist
    #[error("working directory '{path}' does not exist")]
    NotFound {
        /// Directory that could not be resolved
        path: PathBuf,
    },

    /// The path exists but is not a directory
    #[error("working directory '{path}' is not a directory")]
    NotADirectory {
        /// Canonical path
        path: PathBuf,
    },

    /// The canonical directory lies outside the project root
    #[error("working directory '{declared}' resolves to '{resolved}', outside the project")]
    OutsideRoot {
        /// Directory as declared in the manifest
        declared: PathBuf,
        /// Canonical path after symlink resolution
        resolved: PathBuf,
    },
}

impl CwdViolation {
    /// One-line hint for the operator.
    pub fn remediation(&self) -> &'static str {
        match self {
            CwdViolation::Absolute { .. } | CwdViolation::OutsideRoot { .. } => {
                "working directory must be '.' or a relative path inside the project"
            }
            CwdViolation::NotFound { .. } | CwdViolation::NotADirectory { .. } => {
                "create the directory or fix working_directory in the manifest"
            }
        }
    }
}

/// Why a declared environment variable was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvViolationKind {
    /// The name is on the deny-list
    DenyListed,
    /// The name is reserved for variables hookwarden sets itself
    Reserved,
    /// The name is not a valid identifier
    InvalidName,
    /// The value contains a NUL byte
    NulInValue,
}

impl std::fmt::Display for EnvViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            EnvViolationKind::DenyListed => "is on the environment deny-list",
            EnvViolationKind::Reserved => "is reserved for hookwarden",
            EnvViolationKind::InvalidName => "is not a valid variable name",
            EnvViolationKind::NulInValue => "has a value containing a NUL byte",
        };
        f.write_str(text)
    }
}

/// Errors from hook pre-flight and execution.
#[derive(Debug, Error)]
pub enum HookError {
    /// The manifest failed schema validation
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Script path rejected
    #[error("path violation: {0}")]
    PathViolation(#[from] PathViolation),

    /// Working directory rejected
    #[error("working directory violation: {0}")]
    CwdViolation(#[from] CwdViolation),

    /// Environment variable rejected
    #[error("environment variable {name} {kind}")]
    EnvViolation {
        /// Variable name as declared
        name: String,
        /// What is wrong with it
        kind: EnvViolationKind,
    },

    /// The hook ran past its timeout and was killed
    #[error("hook exceeded its timeout of {}s", timeout.as_secs())]
    TimeoutExceeded {
        /// Configured timeout
        timeout: Duration,
    },

    /// The operating system refused to start the process
    #[error("failed to spawn '{program}': {source}")]
    ProcessSpawn {
        /// Program that was being started
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or signalling the process failed
    #[error("process supervision failed: {0}")]
    ProcessWait(#[source] std::io::Error),

    /// The execution could not be recorded
    #[error("audit write failed: {0}")]
    AuditWrite(#[from] AuditError),

    /// An operator interrupt stopped the hook
    #[error("hook cancelled")]
    Cancelled,
}

impl HookError {
    /// Build an environment violation.
    pub fn env(name: impl Into<String>, kind: EnvViolationKind) -> Self {
        HookError::EnvViolation {
            name: name.into(),
            kind,
        }
    }

    /// True for the fail-closed pre-flight errors that reject a hook.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            HookError::Schema(_)
                | HookError::PathViolation(_)
                | HookError::CwdViolation(_)
                | HookError::EnvViolation { .. }
        )
    }

    /// One-line hint for the operator.
    pub fn remediation(&self) -> String {
        match self {
            HookError::Schema(e) => e.remediation().to_string(),
            HookError::PathViolation(v) => v.remediation().to_string(),
            HookError::CwdViolation(v) => v.remediation().to_string(),
            HookError::EnvViolation { name, kind } => match kind {
                EnvViolationKind::DenyListed | EnvViolationKind::Reserved => {
                    format!("remove {name} from the hook's env block")
                }
                EnvViolationKind::InvalidName => {
                    format!("rename {name} to match [A-Za-z_][A-Za-z0-9_]*")
                }
                EnvViolationKind::NulInValue => format!("remove the NUL byte from {name}"),
            },
            HookError::TimeoutExceeded { .. } => {
                "raise the hook's timeout or make the script finish sooner".to_string()
            }
            HookError::ProcessSpawn { .. } => {
                "check the shell or interpreter line of the script".to_string()
            }
            HookError::ProcessWait(_) => "check system process limits".to_string(),
            HookError::AuditWrite(e) => e.remediation().to_string(),
            HookError::Cancelled => "re-run the event when ready".to_string(),
        }
    }
}

impl Severity for HookError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            HookError::Schema(_)
            | HookError::PathViolation(_)
            | HookError::EnvViolation { .. }
            | HookError::AuditWrite(_) => ErrorSeverity::Critical,
            HookError::CwdViolation(_)
            | HookError::TimeoutExceeded { .. }
            | HookError::ProcessSpawn { .. }
            | HookError::ProcessWait(_) => ErrorSeverity::Error,
            HookError::Cancelled => ErrorSeverity::Warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_remediation_mentions_dotdot() {
        let err = HookError::from(PathViolation::Traversal {
            declared: PathBuf::from("../../etc/passwd"),
        });
        assert!(err.is_rejection());
        assert!(err.remediation().contains("'..'"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_env_violation_message_names_variable() {
        let err = HookError::env("LD_PRELOAD", EnvViolationKind::DenyListed);
        assert_eq!(
            err.to_string(),
            "environment variable LD_PRELOAD is on the environment deny-list"
        );
        assert!(err.remediation().contains("LD_PRELOAD"));
    }

    #[test]
    fn test_runtime_errors_are_not_rejections() {
        assert!(!HookError::Cancelled.is_rejection());
        assert!(!HookError::TimeoutExceeded {
            timeout: Duration::from_secs(1)
        }
        .is_rejection());
    }
}

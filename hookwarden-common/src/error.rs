//! Severity classification shared by all hookwarden error types.
//!
//! Each crate defines its own `thiserror` enum. Implementing [`Severity`] lets the
//! audit layer record how serious a rejection or failure was without knowing the
//! concrete error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity levels for error classification
///
/// - **Warning**: advisory only, execution proceeds.
/// - **Error**: the operation for one hook failed; the rest of the batch may continue.
/// - **Critical**: a security invariant is at stake and requires operator attention.
///
/// # Examples
///
/// ```rust
/// use hookwarden_common::ErrorSeverity;
///
/// assert!(ErrorSeverity::Critical > ErrorSeverity::Warning);
/// assert_eq!(ErrorSeverity::Error.to_string(), "error");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Potential issue but operation can proceed
    Warning,

    /// Operation failed but the system can continue
    Error,

    /// Security invariant violated, requires immediate attention
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Trait for error types that have severity levels
///
/// # Example
///
/// ```rust
/// use hookwarden_common::{ErrorSeverity, Severity};
///
/// #[derive(Debug)]
/// enum MyError {
///     Escape,
///     Missing,
/// }
///
/// impl Severity for MyError {
///     fn severity(&self) -> ErrorSeverity {
///         match self {
///             MyError::Escape => ErrorSeverity::Critical,
///             MyError::Missing => ErrorSeverity::Error,
///         }
///     }
/// }
///
/// assert_eq!(MyError::Escape.severity(), ErrorSeverity::Critical);
/// ```
pub trait Severity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&ErrorSeverity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let back: ErrorSeverity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(back, ErrorSeverity::Warning);
    }
}

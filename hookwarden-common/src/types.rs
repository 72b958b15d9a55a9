//! Value types shared between the executor and the audit log.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Final status of one hook execution attempt as written to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookStatus {
    /// Process exited with status 0
    Success,
    /// Process exited non-zero, or the attempt was escalated to failure
    Failed,
    /// Process exceeded its timeout and was terminated
    Timeout,
    /// The framework itself failed (spawn failure, audit failure, cancellation)
    Error,
    /// Pre-flight validation refused to start the process
    Rejected,
}

impl HookStatus {
    /// All statuses in display order.
    pub const ALL: [HookStatus; 5] = [
        HookStatus::Success,
        HookStatus::Failed,
        HookStatus::Timeout,
        HookStatus::Error,
        HookStatus::Rejected,
    ];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStatus::Success => "success",
            HookStatus::Failed => "failed",
            HookStatus::Timeout => "timeout",
            HookStatus::Error => "error",
            HookStatus::Rejected => "rejected",
        }
    }

    /// Whether this status counts against `fail_mode: stop`.
    pub fn is_failure(&self) -> bool {
        !matches!(self, HookStatus::Success)
    }
}

impl fmt::Display for HookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An advisory finding attached to an execution. Never blocks execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityWarning {
    /// Stable identifier of the pattern that matched
    pub pattern_id: String,
    /// Human readable description
    pub description: String,
    /// 1-based line of the script where the pattern matched, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl SecurityWarning {
    /// Create a warning without line information.
    pub fn new(pattern_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            pattern_id: pattern_id.into(),
            description: description.into(),
            line: None,
        }
    }

    /// Attach the line where the finding occurred.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for SecurityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {}): {}", self.pattern_id, line, self.description),
            None => write!(f, "{}: {}", self.pattern_id, self.description),
        }
    }
}

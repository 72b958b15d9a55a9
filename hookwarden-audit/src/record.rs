//! Audit record shapes.

use chrono::{DateTime, Utc};
use hookwarden_common::{ErrorSeverity, HookStatus, SecurityWarning};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Immutable record of one execution attempt or one rejection.
///
/// Built once at the execution boundary and handed to the logger by value.
/// There are no setters after construction apart from the consuming `with_*`
/// builders used while the record is being assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the record was created
    pub timestamp: DateTime<Utc>,
    /// Identifier of the triggering event
    pub event_id: String,
    /// Type of the triggering event
    pub event_type: String,
    /// Name of the hook
    pub hook_name: String,
    /// Outcome
    pub status: HookStatus,
    /// Exit code when the process exited normally
    pub exit_code: Option<i32>,
    /// Wall-clock duration of the attempt
    pub duration_ms: u64,
    /// Resolved script path, or the inline command
    pub script_path: Option<String>,
    /// Resolved working directory
    pub working_directory: Option<String>,
    /// Names (never values) of the variables in the child environment
    #[serde(default)]
    pub environment_keys: Vec<String>,
    /// Lines written to stdout
    #[serde(default)]
    pub stdout_lines: usize,
    /// Lines written to stderr
    #[serde(default)]
    pub stderr_lines: usize,
    /// Advisory findings
    #[serde(default)]
    pub security_warnings: Vec<String>,
    /// Why the attempt was rejected or errored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// User that ran hookwarden
    pub user: String,
    /// Process id of the hookwarden process that wrote the record
    pub pid: u32,
}

impl AuditRecord {
    /// Start a record for `hook_name` handling `event_id`.
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        hook_name: impl Into<String>,
        status: HookStatus,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            event_id: event_id.into(),
            event_type: event_type.into(),
            hook_name: hook_name.into(),
            status,
            exit_code: None,
            duration_ms: 0,
            script_path: None,
            working_directory: None,
            environment_keys: Vec::new(),
            stdout_lines: 0,
            stderr_lines: 0,
            security_warnings: Vec::new(),
            reason: None,
            user: current_user(),
            pid: std::process::id(),
        }
    }

    /// Attach the process exit code and duration.
    pub fn with_execution_result(mut self, exit_code: Option<i32>, duration_ms: u64) -> Self {
        self.exit_code = exit_code;
        self.duration_ms = duration_ms;
        self
    }

    /// Attach what was run and where.
    pub fn with_target(mut self, script_path: Option<&str>, working_directory: Option<&Path>) -> Self {
        self.script_path = script_path.map(str::to_string);
        self.working_directory = working_directory.map(|p| p.display().to_string());
        self
    }

    /// Attach the environment variable names.
    pub fn with_environment_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Attach output line counts.
    pub fn with_output_lines(mut self, stdout_lines: usize, stderr_lines: usize) -> Self {
        self.stdout_lines = stdout_lines;
        self.stderr_lines = stderr_lines;
        self
    }

    /// Attach advisory warnings.
    pub fn with_warnings(mut self, warnings: &[SecurityWarning]) -> Self {
        self.security_warnings = warnings.iter().map(ToString::to_string).collect();
        self
    }

    /// Attach the rejection or error reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Discriminator for [`SecurityEvent`] lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityEventKind {
    /// The only kind
    #[serde(rename = "security_event")]
    SecurityEvent,
}

/// Security-relevant occurrence that involves no hook execution, such as a
/// manifest that failed validation or an explicit retention prune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Always `security_event`
    #[serde(rename = "type")]
    pub kind: SecurityEventKind,
    /// What happened, e.g. `manifest_invalid`
    pub event_type: String,
    /// How serious it is
    pub severity: ErrorSeverity,
    /// Human readable description
    pub description: String,
    /// Structured details
    #[serde(default)]
    pub context: serde_json::Value,
}

impl SecurityEvent {
    /// Create a new security event timestamped now.
    pub fn new(
        event_type: impl Into<String>,
        severity: ErrorSeverity,
        description: impl Into<String>,
        context: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: SecurityEventKind::SecurityEvent,
            event_type: event_type.into(),
            severity,
            description: description.into(),
            context,
        }
    }
}

/// Any line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuditEntry {
    /// A security event; tried first because it carries the `type` tag
    Security(SecurityEvent),
    /// An execution or rejection record
    Execution(AuditRecord),
}

impl AuditEntry {
    /// When the entry was written.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AuditEntry::Security(e) => e.timestamp,
            AuditEntry::Execution(r) => r.timestamp,
        }
    }

    /// The execution record, if this is one.
    pub fn as_record(&self) -> Option<&AuditRecord> {
        match self {
            AuditEntry::Execution(r) => Some(r),
            AuditEntry::Security(_) => None,
        }
    }
}

/// Name of the user running hookwarden.
///
/// Resolved from the password database for the real uid, falling back to
/// `$USER`, then to the numeric uid.
pub fn current_user() -> String {
    let uid = nix::unistd::getuid();
    if let Ok(Some(user)) = nix::unistd::User::from_uid(uid) {
        return user.name;
    }
    std::env::var("USER").unwrap_or_else(|_| uid.to_string())
}

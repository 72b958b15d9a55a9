//! Typed, validated hook manifest.
//!
//! Values of these types only come out of [`crate::load`]; every invariant the
//! schema checks holds for any instance a caller can observe.

use crate::matcher::{EventContext, EventMatcher};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Lower bound for hook timeouts, in seconds.
pub const MIN_TIMEOUT_SECS: u64 = 1;

/// Upper bound for hook timeouts, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// What happens to the remaining hooks of an event when this hook does not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Record the outcome and run the next hook
    #[default]
    Continue,
    /// Skip every later hook for the same event
    Stop,
}

impl FailMode {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "continue" => Some(FailMode::Continue),
            "stop" => Some(FailMode::Stop),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailMode::Continue => write!(f, "continue"),
            FailMode::Stop => write!(f, "stop"),
        }
    }
}

/// The thing a hook runs. Exactly one is declared per hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookAction {
    /// Script path relative to the hooks directory, not yet resolved
    Script(PathBuf),
    /// Inline command passed to the configured shell with `-c`
    Command(String),
}

/// Manifest-wide defaults applied to hooks that do not override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Defaults {
    /// Timeout applied when a hook does not declare one
    pub timeout: Duration,
    /// Working directory relative to the project root
    pub working_directory: PathBuf,
    /// Shell used to run inline commands
    pub shell: String,
    /// Fail mode applied when a hook does not declare one
    pub fail_mode: FailMode,
    /// Directory, relative to the project root, that scripts must live under
    pub hooks_dir: PathBuf,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            working_directory: PathBuf::from("."),
            shell: "/bin/sh".to_string(),
            fail_mode: FailMode::Continue,
            hooks_dir: PathBuf::from(".hookwarden/hooks"),
        }
    }
}

/// Bounds applied to every hook process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionLimits {
    /// Time between the graceful and the forceful termination signal
    pub grace_period: Duration,
    /// Maximum bytes kept per output stream
    pub max_output_bytes: usize,
    /// Maximum lines kept per output stream
    pub max_output_lines: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            max_output_bytes: 64 * 1024,
            max_output_lines: 1000,
        }
    }
}

/// Audit log location, rotation, and retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditSettings {
    /// Active log file, relative to the project root unless absolute
    pub path: PathBuf,
    /// Size at which the active file is rotated
    pub max_size_bytes: u64,
    /// Number of rotated files kept
    pub max_files: usize,
    /// Age after which records are removed by an explicit prune
    pub retention_days: u32,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".hookwarden/audit.jsonl"),
            max_size_bytes: 10 * 1024 * 1024,
            max_files: 5,
            retention_days: 30,
        }
    }
}

/// One validated hook entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookDefinition {
    /// Unique name matching `^[a-z0-9-]+$`
    pub name: String,
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Events this hook subscribes to
    pub events: Vec<EventMatcher>,
    /// Script or inline command
    pub action: HookAction,
    /// Effective timeout, within [`MIN_TIMEOUT_SECS`]..=[`MAX_TIMEOUT_SECS`]
    pub timeout: Duration,
    /// Declared environment variables in declaration order
    pub env: IndexMap<String, String>,
    /// Effective working directory relative to the project root
    pub working_directory: PathBuf,
    /// Effective fail mode
    pub fail_mode: FailMode,
    /// Disabled hooks are validated but never run
    pub enabled: bool,
}

impl HookDefinition {
    /// True when any of the hook's matchers accepts the event.
    pub fn subscribes_to(&self, event: &EventContext) -> bool {
        self.events.iter().any(|m| m.matches(event))
    }
}

/// The complete, validated manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookManifest {
    /// Normalized schema version
    pub version: String,
    /// Manifest-wide defaults
    pub defaults: Defaults,
    /// Process limits
    pub limits: ExecutionLimits,
    /// Audit settings
    pub audit: AuditSettings,
    /// Hooks in declaration order
    pub hooks: Vec<HookDefinition>,
}

impl HookManifest {
    /// Enabled hooks subscribed to `event`, in manifest order.
    pub fn hooks_for<'a>(&'a self, event: &'a EventContext) -> impl Iterator<Item = &'a HookDefinition> + 'a {
        self.hooks
            .iter()
            .filter(move |hook| hook.enabled && hook.subscribes_to(event))
    }

    /// Look up a hook by name.
    pub fn hook(&self, name: &str) -> Option<&HookDefinition> {
        self.hooks.iter().find(|hook| hook.name == name)
    }
}

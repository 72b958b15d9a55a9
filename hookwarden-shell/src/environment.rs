//! Child environment construction.
//!
//! The child never inherits the invoking process's environment. It starts
//! from a fixed base and gains only the variables the manifest declares,
//! after the deny-list check.

use crate::error::{EnvViolationKind, HookError, HookResult};
use hookwarden_common::SecurityWarning;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// `PATH` given to every hook.
pub const BASE_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// `LANG` given to every hook.
pub const BASE_LANG: &str = "C.UTF-8";

/// Prefix of the variables hookwarden sets itself.
pub const RESERVED_PREFIX: &str = "HOOKWARDEN_";

/// Exact names a hook may never set.
const DENIED_NAMES: &[&str] = &[
    // command search path override
    "PATH",
    "CDPATH",
    // shell field separator and startup hooks
    "IFS",
    "ENV",
    "BASH_ENV",
    "PS4",
    "PROMPT_COMMAND",
    "SHELLOPTS",
    "BASHOPTS",
    "GLOBIGNORE",
    // interpreter module search paths
    "PYTHONPATH",
    "PYTHONHOME",
    "PYTHONSTARTUP",
    "PERL5LIB",
    "PERLLIB",
    "PERL5OPT",
    "RUBYLIB",
    "RUBYOPT",
    "NODE_PATH",
    "NODE_OPTIONS",
    "GCONV_PATH",
];

/// Prefixes a hook may never set: dynamic-linker control.
const DENIED_PREFIXES: &[&str] = &["LD_", "DYLD_"];

/// Characters a shell would interpret.
const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '$', '`', '<', '>', '(', ')', '{', '}', '*', '?', '[', ']', '!', '\\', '\n',
    '\'', '"', '~',
];

fn env_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

/// Returns true if `name` may not be declared by a hook.
pub fn is_denied(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    DENIED_NAMES.contains(&upper.as_str())
        || DENIED_PREFIXES.iter().any(|p| upper.starts_with(p))
}

/// Final environment block for one child, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: IndexMap<String, String>,
}

impl Environment {
    /// Variable names, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// All pairs, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True when there are no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

/// Sanitized environment plus the advisory findings made while building it.
#[derive(Debug, Clone, Default)]
pub struct SanitizedEnvironment {
    /// The environment to hand to the child
    pub environment: Environment,
    /// Non-fatal findings, e.g. metacharacters in values
    pub warnings: Vec<SecurityWarning>,
}

/// Builds child environments from a fixed base.
#[derive(Debug, Clone)]
pub struct EnvironmentSanitizer {
    base: Environment,
}

impl Default for EnvironmentSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentSanitizer {
    /// Sanitizer with the standard base: `PATH`, `HOME`, `USER`, `LANG`.
    ///
    /// `HOME` and `USER` carry the invoking user's values; nothing else is
    /// read from the parent environment.
    pub fn new() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/".to_string());
        Self::with_base(home, hookwarden_audit::current_user())
    }

    /// Sanitizer with explicit `HOME` and `USER` values.
    pub fn with_base(home: impl Into<String>, user: impl Into<String>) -> Self {
        let mut base = Environment::default();
        base.insert("PATH", BASE_PATH);
        base.insert("HOME", home);
        base.insert("USER", user);
        base.insert("LANG", BASE_LANG);
        Self { base }
    }

    /// The fixed base every child starts from.
    pub fn base(&self) -> &Environment {
        &self.base
    }

    /// Merge `declared` onto the base.
    ///
    /// Fails closed on the first denied, reserved, or malformed name and on
    /// NUL bytes in values. Values are copied byte for byte; metacharacters
    /// only produce a warning.
    pub fn build(&self, declared: &IndexMap<String, String>) -> HookResult<SanitizedEnvironment> {
        let mut result = SanitizedEnvironment {
            environment: self.base.clone(),
            warnings: Vec::new(),
        };

        for (name, value) in declared {
            if !env_name_regex().is_match(name) {
                return Err(reject(name, EnvViolationKind::InvalidName));
            }
            if is_denied(name) {
                return Err(reject(name, EnvViolationKind::DenyListed));
            }
            if name.to_ascii_uppercase().starts_with(RESERVED_PREFIX) {
                return Err(reject(name, EnvViolationKind::Reserved));
            }
            if value.contains('\0') {
                return Err(reject(name, EnvViolationKind::NulInValue));
            }
            if value.contains(SHELL_METACHARACTERS) {
                debug!(target: "hook_security", name = %name, "Environment value contains shell metacharacters");
                result.warnings.push(SecurityWarning::new(
                    "env-metacharacters",
                    format!("value of {name} contains shell metacharacters; it is passed literally"),
                ));
            }
            result.environment.insert(name.clone(), value.clone());
        }

        Ok(result)
    }
}

/// Add the identifier variables hookwarden sets for every hook.
pub(crate) fn add_hook_identity(env: &mut Environment, event_type: &str, event_id: &str, hook_name: &str) {
    env.insert("HOOKWARDEN_EVENT_TYPE", event_type);
    env.insert("HOOKWARDEN_EVENT_ID", event_id);
    env.insert("HOOKWARDEN_HOOK_NAME", hook_name);
}

fn reject(name: &str, kind: EnvViolationKind) -> HookError {
    warn!(target: "hook_security", name = %name, reason = %kind, "Environment variable rejected");
    HookError::env(name, kind)
}

//! Manifest loader and schema validator.
//!
//! Parsing and validation are a single pure step: text in, either a complete
//! [`HookManifest`] or a [`SchemaError`] listing every violation. There is no
//! partial result and no lazy validation path.

use crate::error::{ConfigError, ConfigResult, SchemaError, SchemaViolation};
use crate::manifest::{
    AuditSettings, Defaults, ExecutionLimits, FailMode, HookAction, HookDefinition, HookManifest,
    MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS,
};
use crate::matcher::{EventMatcher, FieldFilter, ANY_EVENT};
use crate::raw::{RawAudit, RawDefaults, RawEvent, RawHook, RawLimits, RawManifest};
use glob::Pattern;
use hookwarden_common::has_parent_segments;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, trace};

/// The manifest schema version this build understands.
pub const SUPPORTED_VERSION: &str = "1.0";

/// Upper bound for the termination grace window, in seconds.
const MAX_GRACE_PERIOD_SECS: i64 = 300;

/// Upper bound for audit retention, in days.
const MAX_RETENTION_DAYS: i64 = 36_500;

fn hook_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9-]+$").expect("hook name pattern is valid"))
}

fn env_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env name pattern is valid"))
}

fn event_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.:-]+$").expect("event type pattern is valid"))
}

/// Parse and validate a manifest from text.
///
/// # Errors
///
/// Returns a [`SchemaError`] if the text is not a well-formed manifest or if
/// any entry violates the schema. No partially valid manifest is ever returned.
pub fn load(source: &str) -> Result<HookManifest, SchemaError> {
    let raw: RawManifest = serde_yaml_ng::from_str(source).map_err(|e| {
        let location = e
            .location()
            .map(|loc| format!("line {} column {}", loc.line(), loc.column()))
            .unwrap_or_else(|| "manifest".to_string());
        SchemaError::single(location, e.to_string())
    })?;

    let manifest = SchemaValidator::default().validate(raw)?;
    debug!(
        target: "hook_config",
        hooks = manifest.hooks.len(),
        version = %manifest.version,
        "Hook manifest validated"
    );
    if tracing::enabled!(target: "hook_config", tracing::Level::TRACE) {
        if let Ok(yaml) = serde_yaml_ng::to_string(&manifest) {
            trace!(target: "hook_config", "Effective manifest:\n{yaml}");
        }
    }
    Ok(manifest)
}

/// Read and validate a manifest file.
pub fn load_file(path: &Path) -> ConfigResult<HookManifest> {
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest = load(&source)?;
    info!(
        target: "hook_config",
        path = %path.display(),
        hooks = manifest.hooks.len(),
        "Loaded hook manifest"
    );
    Ok(manifest)
}

/// Collects violations while converting the raw manifest.
#[derive(Default)]
struct SchemaValidator {
    violations: Vec<SchemaViolation>,
}

impl SchemaValidator {
    fn fail(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.violations.push(SchemaViolation::new(location, message));
    }

    fn validate(mut self, raw: RawManifest) -> Result<HookManifest, SchemaError> {
        let version = self.version(raw.version.as_ref());
        let defaults = self.defaults(raw.defaults.unwrap_or_default());
        let limits = self.limits(raw.limits.unwrap_or_default());
        let audit = self.audit(raw.audit.unwrap_or_default());

        let mut seen = HashSet::new();
        let mut hooks = Vec::with_capacity(raw.hooks.len());
        for (index, raw_hook) in raw.hooks.into_iter().enumerate() {
            let location = format!("hooks[{index}]");
            if let Some(hook) = self.hook(&location, raw_hook, &defaults) {
                if !seen.insert(hook.name.clone()) {
                    self.fail(
                        format!("{location}.name"),
                        format!("duplicate hook name '{}'", hook.name),
                    );
                }
                hooks.push(hook);
            }
        }

        if !self.violations.is_empty() {
            return Err(SchemaError {
                violations: self.violations,
            });
        }

        Ok(HookManifest {
            version,
            defaults,
            limits,
            audit,
            hooks,
        })
    }

    fn version(&mut self, value: Option<&serde_yaml_ng::Value>) -> String {
        let text = match value {
            Some(serde_yaml_ng::Value::String(s)) => s.clone(),
            Some(serde_yaml_ng::Value::Number(n)) => n.to_string(),
            Some(_) => {
                self.fail("version", "must be a string or number");
                return String::new();
            }
            None => {
                self.fail("version", "is required");
                return String::new();
            }
        };
        match text.as_str() {
            "1" | "1.0" => SUPPORTED_VERSION.to_string(),
            other => {
                self.fail(
                    "version",
                    format!("unsupported version '{other}', expected '{SUPPORTED_VERSION}'"),
                );
                text
            }
        }
    }

    fn timeout(&mut self, location: &str, value: Option<i64>, fallback: Duration) -> Duration {
        match value {
            None => fallback,
            Some(secs) if (MIN_TIMEOUT_SECS as i64..=MAX_TIMEOUT_SECS as i64).contains(&secs) => {
                Duration::from_secs(secs as u64)
            }
            Some(secs) => {
                self.fail(
                    location,
                    format!(
                        "timeout {secs} is out of bounds, must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS} seconds"
                    ),
                );
                fallback
            }
        }
    }

    fn positive(&mut self, location: &str, value: Option<i64>, fallback: u64) -> u64 {
        match value {
            None => fallback,
            Some(v) if v > 0 => v as u64,
            Some(v) => {
                self.fail(location, format!("must be greater than zero, got {v}"));
                fallback
            }
        }
    }

    fn fail_mode(&mut self, location: &str, value: Option<&str>, fallback: FailMode) -> FailMode {
        match value {
            None => fallback,
            Some(text) => FailMode::parse(text).unwrap_or_else(|| {
                self.fail(
                    location,
                    format!("'{text}' is not a fail mode, expected 'continue' or 'stop'"),
                );
                fallback
            }),
        }
    }

    fn non_empty(&mut self, location: &str, value: Option<String>, fallback: &str) -> String {
        match value {
            None => fallback.to_string(),
            Some(text) if !text.trim().is_empty() => text,
            Some(_) => {
                self.fail(location, "must not be empty");
                fallback.to_string()
            }
        }
    }

    fn defaults(&mut self, raw: RawDefaults) -> Defaults {
        let base = Defaults::default();
        let hooks_dir = match raw.hooks_dir {
            None => base.hooks_dir.clone(),
            Some(dir) => {
                let path = PathBuf::from(&dir);
                if dir.trim().is_empty() {
                    self.fail("defaults.hooks_dir", "must not be empty");
                } else if path.is_absolute() || has_parent_segments(&path) {
                    self.fail(
                        "defaults.hooks_dir",
                        "must be a relative path without '..' segments",
                    );
                }
                path
            }
        };
        let working_directory = self.non_empty(
            "defaults.working_directory",
            raw.working_directory,
            ".",
        );

        Defaults {
            timeout: self.timeout("defaults.timeout", raw.timeout, base.timeout),
            working_directory: PathBuf::from(working_directory),
            shell: self.non_empty("defaults.shell", raw.shell, &base.shell),
            fail_mode: self.fail_mode(
                "defaults.fail_mode",
                raw.fail_mode.as_deref(),
                base.fail_mode,
            ),
            hooks_dir,
        }
    }

    fn limits(&mut self, raw: RawLimits) -> ExecutionLimits {
        let base = ExecutionLimits::default();
        let grace_period = match raw.grace_period {
            None => base.grace_period,
            Some(secs) if (1..=MAX_GRACE_PERIOD_SECS).contains(&secs) => {
                Duration::from_secs(secs as u64)
            }
            Some(secs) => {
                self.fail(
                    "limits.grace_period",
                    format!("{secs} is out of bounds, must be between 1 and {MAX_GRACE_PERIOD_SECS} seconds"),
                );
                base.grace_period
            }
        };
        ExecutionLimits {
            grace_period,
            max_output_bytes: self.positive(
                "limits.max_output_bytes",
                raw.max_output_bytes,
                base.max_output_bytes as u64,
            ) as usize,
            max_output_lines: self.positive(
                "limits.max_output_lines",
                raw.max_output_lines,
                base.max_output_lines as u64,
            ) as usize,
        }
    }

    fn audit(&mut self, raw: RawAudit) -> AuditSettings {
        let base = AuditSettings::default();
        let path = self.non_empty("audit.path", raw.path, &base.path.to_string_lossy());
        AuditSettings {
            path: PathBuf::from(path),
            max_size_bytes: self.positive("audit.max_size_bytes", raw.max_size_bytes, base.max_size_bytes),
            max_files: self.positive("audit.max_files", raw.max_files, base.max_files as u64) as usize,
            retention_days: self.retention_days(raw.retention_days, base.retention_days),
        }
    }

    fn retention_days(&mut self, value: Option<i64>, fallback: u32) -> u32 {
        match value {
            None => fallback,
            Some(days) if (1..=MAX_RETENTION_DAYS).contains(&days) => {
                u32::try_from(days).unwrap_or(fallback)
            }
            Some(days) => {
                self.fail(
                    "audit.retention_days",
                    format!("{days} is out of bounds, must be between 1 and {MAX_RETENTION_DAYS} days"),
                );
                fallback
            }
        }
    }

    fn hook(&mut self, location: &str, raw: RawHook, defaults: &Defaults) -> Option<HookDefinition> {
        let name = match raw.name {
            Some(name) if hook_name_regex().is_match(&name) => name,
            Some(name) => {
                self.fail(
                    format!("{location}.name"),
                    format!("'{name}' must match ^[a-z0-9-]+$"),
                );
                name
            }
            None => {
                self.fail(format!("{location}.name"), "is required");
                String::new()
            }
        };

        let action = match (raw.script, raw.command) {
            (Some(script), None) if !script.trim().is_empty() => {
                Some(HookAction::Script(PathBuf::from(script)))
            }
            (None, Some(command)) if !command.trim().is_empty() => {
                Some(HookAction::Command(command))
            }
            (Some(_), None) | (None, Some(_)) => {
                self.fail(location, "script/command must not be empty");
                None
            }
            (Some(_), Some(_)) | (None, None) => {
                self.fail(location, "exactly one of 'script' or 'command' must be set");
                None
            }
        };

        let events = self.events(location, raw.events);
        let env = self.env(location, raw.env);
        let timeout = self.timeout(&format!("{location}.timeout"), raw.timeout, defaults.timeout);
        let fail_mode = self.fail_mode(
            &format!("{location}.fail_mode"),
            raw.fail_mode.as_deref(),
            defaults.fail_mode,
        );
        let working_directory = self.non_empty(
            &format!("{location}.working_directory"),
            raw.working_directory,
            &defaults.working_directory.to_string_lossy(),
        );

        Some(HookDefinition {
            name,
            description: raw.description,
            events,
            action: action?,
            timeout,
            env,
            working_directory: PathBuf::from(working_directory),
            fail_mode,
            enabled: raw.enabled.unwrap_or(true),
        })
    }

    fn events(&mut self, location: &str, raw: Vec<RawEvent>) -> Vec<EventMatcher> {
        if raw.is_empty() {
            self.fail(format!("{location}.events"), "at least one event is required");
        }
        let mut matchers = Vec::with_capacity(raw.len());
        for (index, event) in raw.into_iter().enumerate() {
            let event_location = format!("{location}.events[{index}]");
            let event_type = match event.event_type {
                Some(t) if t == ANY_EVENT || event_type_regex().is_match(&t) => t,
                Some(t) => {
                    self.fail(
                        format!("{event_location}.type"),
                        format!("'{t}' is not a valid event type"),
                    );
                    continue;
                }
                None => {
                    self.fail(format!("{event_location}.type"), "is required");
                    continue;
                }
            };

            let mut filter = Vec::new();
            for (field, pattern) in event.filter.unwrap_or_default() {
                if field.is_empty() {
                    self.fail(format!("{event_location}.filter"), "field names must not be empty");
                    continue;
                }
                match Pattern::new(&pattern) {
                    Ok(pattern) => filter.push(FieldFilter { field, pattern }),
                    Err(e) => self.fail(
                        format!("{event_location}.filter.{field}"),
                        format!("invalid pattern '{pattern}': {e}"),
                    ),
                }
            }
            matchers.push(EventMatcher { event_type, filter });
        }
        matchers
    }

    fn env(&mut self, location: &str, raw: IndexMap<String, String>) -> IndexMap<String, String> {
        for name in raw.keys() {
            if !env_name_regex().is_match(name) {
                self.fail(
                    format!("{location}.env.{name}"),
                    "environment variable names must match ^[A-Za-z_][A-Za-z0-9_]*$",
                );
            }
        }
        raw
    }
}

//! Serde mirror of the manifest as written on disk.
//!
//! Every struct denies unknown fields, so a misspelled key is reported instead
//! of silently falling back to a default. Numeric fields are signed so that
//! out-of-range values reach the validator and get a bounds message rather
//! than a generic type error.

use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawManifest {
    pub version: Option<serde_yaml_ng::Value>,
    #[serde(default)]
    pub defaults: Option<RawDefaults>,
    #[serde(default)]
    pub limits: Option<RawLimits>,
    #[serde(default)]
    pub audit: Option<RawAudit>,
    #[serde(default)]
    pub hooks: Vec<RawHook>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawDefaults {
    pub timeout: Option<i64>,
    pub working_directory: Option<String>,
    pub shell: Option<String>,
    pub fail_mode: Option<String>,
    pub hooks_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawLimits {
    pub grace_period: Option<i64>,
    pub max_output_bytes: Option<i64>,
    pub max_output_lines: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawAudit {
    pub path: Option<String>,
    pub max_size_bytes: Option<i64>,
    pub max_files: Option<i64>,
    pub retention_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawHook {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    pub script: Option<String>,
    pub command: Option<String>,
    pub timeout: Option<i64>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    pub working_directory: Option<String>,
    pub fail_mode: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub filter: Option<IndexMap<String, String>>,
}

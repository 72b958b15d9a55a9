//! # hookwarden Configuration
//!
//! Loads the hook manifest, validates it against the schema, and produces an
//! immutable [`HookManifest`]. A manifest is all-or-nothing: a single invalid
//! entry fails the entire load, so one bad hook can never weaken the checks
//! applied to the others.
//!
//! ```rust
//! use hookwarden_config::{load, FailMode};
//!
//! let manifest = load(r#"
//! version: "1.0"
//! hooks:
//!   - name: lint-on-commit
//!     events:
//!       - type: vcs.commit
//!     command: cargo fmt --check
//!     fail_mode: stop
//! "#).unwrap();
//!
//! let hook = &manifest.hooks[0];
//! assert_eq!(hook.name, "lint-on-commit");
//! assert_eq!(hook.fail_mode, FailMode::Stop);
//! assert_eq!(hook.timeout.as_secs(), 30);
//! ```

pub mod discovery;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod matcher;
mod raw;

pub use discovery::{discover_manifest, MANIFEST_FILE_NAMES};
pub use error::{ConfigError, ConfigResult, SchemaError, SchemaViolation};
pub use loader::{load, load_file, SUPPORTED_VERSION};
pub use manifest::{
    AuditSettings, Defaults, ExecutionLimits, FailMode, HookAction, HookDefinition, HookManifest,
    MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS,
};
pub use matcher::{EventContext, EventMatcher, FieldFilter};

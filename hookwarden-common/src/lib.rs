//! # hookwarden Common
//!
//! Foundational types shared by every hookwarden crate.
//!
//! ## Modules
//!
//! - [`error`] - Severity classification shared by all error types
//! - [`types`] - Execution status and advisory warning value types
//! - [`paths`] - Project root discovery and component-wise containment checks

pub mod error;
pub mod paths;
pub mod types;

pub use error::{ErrorSeverity, Severity};
pub use paths::{
    find_project_root_from, has_parent_segments, is_descendant_of, HOOKWARDEN_DIR_NAME,
};
pub use types::{HookStatus, SecurityWarning};

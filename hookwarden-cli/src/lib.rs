//! hookwarden - repository hook runner with fail-closed pre-flight checks.
//!
//! The binary is a thin layer over the library crates:
//!
//! - `hookwarden-config` loads and validates the manifest
//! - `hookwarden-shell` validates and runs hooks
//! - `hookwarden-audit` records every attempt
//!
//! This crate adds CLI parsing, project resolution, and output formatting.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod exit_codes;

pub use cli::{Cli, Commands};
pub use context::ProjectContext;
pub use error::{CliError, CliResult};

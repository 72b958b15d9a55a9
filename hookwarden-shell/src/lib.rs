//! # hookwarden Shell
//!
//! Pre-flight validation and bounded execution of hook processes.
//!
//! Structural checks fail closed:
//!
//! - [`resolve_script`]: scripts must resolve inside the hooks directory
//! - [`resolve_working_directory`]: the working directory must resolve inside the project
//! - [`EnvironmentSanitizer`]: minimal base environment, deny-listed names refused
//!
//! Content scanning ([`scan`]) is advisory only. The [`HookExecutor`] runs a
//! validated hook in its own process group with a timeout, escalating from
//! SIGTERM to SIGKILL, and writes one audit record per attempt. The
//! [`HookRunner`] runs every hook for an event in manifest order.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use hookwarden_audit::{AuditLogger, RotationPolicy};
//! use hookwarden_shell::{HookEvent, HookExecutor, HookRunner};
//!
//! let manifest = hookwarden_config::load_file(".hookwarden/hooks.yaml".as_ref())?;
//! let audit = Arc::new(AuditLogger::new(".hookwarden/audit.jsonl", RotationPolicy::default())?);
//! let executor = HookExecutor::new(&manifest, ".", audit);
//! let runner = HookRunner::new(manifest, executor);
//! let report = runner.run_event(&HookEvent::new("vcs.commit", "{}")).await;
//! println!("{} hooks ran", report.results.len());
//! # Ok(())
//! # }
//! ```

pub mod environment;
pub mod error;
pub mod executor;
pub mod output;
pub mod paths;
pub mod process;
pub mod runner;
pub mod scanner;

pub use environment::{Environment, EnvironmentSanitizer, SanitizedEnvironment, BASE_PATH};
pub use error::{CwdViolation, EnvViolationKind, HookError, HookResult, PathViolation};
pub use executor::{
    ExecutionRequest, ExecutionResult, ExecutionState, ExecutionTarget, HookEvent, HookExecutor,
    Preflight,
};
pub use output::{capture_stream, CapturedOutput, OutputCapture, OutputLimits};
pub use paths::{resolve_script, resolve_working_directory};
pub use process::ProcessGuard;
pub use runner::{BatchReport, HookRunner, PreflightOutcome, VALIDATE_EVENT_TYPE};
pub use scanner::{scan, scan_file, DangerousPattern, DANGEROUS_PATTERNS};

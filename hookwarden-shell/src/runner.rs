//! Per-event batch execution and manifest-wide pre-flight.

use crate::error::HookError;
use crate::executor::{ExecutionResult, HookEvent, HookExecutor};
use hookwarden_audit::{AuditError, AuditRecord};
use hookwarden_common::{HookStatus, SecurityWarning};
use hookwarden_config::HookManifest;
use tracing::{info, warn};

/// Event type recorded for rejections found by [`HookRunner::preflight_all`].
pub const VALIDATE_EVENT_TYPE: &str = "hookwarden.validate";

/// Results of every hook run for one event, in manifest order.
#[derive(Debug)]
pub struct BatchReport {
    /// Event id
    pub event_id: String,
    /// Event type
    pub event_type: String,
    /// One result per attempted hook
    pub results: Vec<ExecutionResult>,
    /// Name of the `stop` hook that ended the batch early
    pub halted_by: Option<String>,
    /// True when an operator interrupt ended the batch
    pub cancelled: bool,
}

impl BatchReport {
    /// True when no hook matched the event.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// True when a `stop` hook failed, timed out, or was rejected.
    pub fn halted(&self) -> bool {
        self.halted_by.is_some()
    }
}

/// Pre-flight verdict for one hook.
#[derive(Debug)]
pub struct PreflightOutcome {
    /// Hook name
    pub hook_name: String,
    /// Advisory findings, or the violation that rejects the hook
    pub verdict: Result<Vec<SecurityWarning>, HookError>,
}

/// Runs every hook subscribed to an event, one at a time.
///
/// Hooks run sequentially in manifest order so a failing `stop` hook ends
/// the batch deterministically.
#[derive(Debug)]
pub struct HookRunner {
    manifest: HookManifest,
    executor: HookExecutor,
}

impl HookRunner {
    /// Runner over a validated manifest.
    pub fn new(manifest: HookManifest, executor: HookExecutor) -> Self {
        Self { manifest, executor }
    }

    /// The manifest.
    pub fn manifest(&self) -> &HookManifest {
        &self.manifest
    }

    /// The executor.
    pub fn executor(&self) -> &HookExecutor {
        &self.executor
    }

    /// Run the hooks matching `event`.
    pub async fn run_event(&self, event: &HookEvent) -> BatchReport {
        let context = event.context();
        let cancel = self.executor.cancellation_token();
        let mut report = BatchReport {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            results: Vec::new(),
            halted_by: None,
            cancelled: false,
        };

        for hook in self.manifest.hooks_for(&context) {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let result = self.executor.execute(hook, event).await;
            let halts = result.halts_batch();
            report.results.push(result);
            if halts {
                info!(
                    target: "hook_exec",
                    hook = %hook.name,
                    event_id = %event.id,
                    "fail_mode=stop hook did not succeed, skipping remaining hooks"
                );
                report.halted_by = Some(hook.name.clone());
                break;
            }
        }
        if cancel.is_cancelled() {
            report.cancelled = true;
        }

        info!(
            target: "hook_exec",
            event_type = %event.event_type,
            event_id = %event.id,
            hooks = report.results.len(),
            halted = report.halted(),
            "Event processed"
        );
        report
    }

    /// Pre-flight every enabled hook without running anything.
    ///
    /// Each rejected hook is written to the audit log as one `rejected`
    /// record under [`VALIDATE_EVENT_TYPE`] and `event_id`. Only an audit
    /// write failure is returned as an error.
    pub fn preflight_all(&self, event_id: &str) -> Result<Vec<PreflightOutcome>, AuditError> {
        let mut outcomes = Vec::new();
        for hook in self.manifest.hooks.iter().filter(|h| h.enabled) {
            let verdict = self.executor.preflight(hook).map(|p| p.warnings);
            if let Err(e) = &verdict {
                warn!(target: "hook_security", hook = %hook.name, error = %e, "Pre-flight rejected hook");
                let record = AuditRecord::new(event_id, VALIDATE_EVENT_TYPE, &hook.name, HookStatus::Rejected)
                    .with_environment_keys(hook.env.keys().map(String::as_str))
                    .with_reason(e.to_string());
                self.executor.audit().append(&record)?;
            }
            outcomes.push(PreflightOutcome {
                hook_name: hook.name.clone(),
                verdict,
            });
        }
        Ok(outcomes)
    }
}

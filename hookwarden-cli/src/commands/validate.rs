//! `hookwarden validate` - schema check plus static pre-flight.

use crate::context::ProjectContext;
use crate::error::CliResult;
use crate::exit_codes::{EXIT_FAILURE, EXIT_SUCCESS};
use hookwarden_shell::{HookExecutor, HookRunner};
use std::sync::Arc;

/// Validate the manifest and pre-flight every enabled hook.
///
/// Each rejected hook is also written to the audit log. Returns
/// `EXIT_FAILURE` when any hook is rejected; a schema failure surfaces as an
/// error (exit 2).
pub fn run_validate(ctx: &ProjectContext) -> CliResult<i32> {
    let manifest = ctx.load_manifest()?;
    let audit = Arc::new(ctx.audit_logger(&manifest.audit)?);
    let disabled: Vec<String> = manifest
        .hooks
        .iter()
        .filter(|h| !h.enabled)
        .map(|h| h.name.clone())
        .collect();
    let executor = HookExecutor::new(&manifest, &ctx.project_root, audit);
    let runner = HookRunner::new(manifest, executor);

    let validation_id = ulid::Ulid::new().to_string();
    let outcomes = runner.preflight_all(&validation_id)?;

    let mut rejected = 0;
    for outcome in &outcomes {
        match &outcome.verdict {
            Ok(warnings) => {
                println!("{}: ok", outcome.hook_name);
                for warning in warnings {
                    println!("  warning: {warning}");
                }
            }
            Err(e) => {
                rejected += 1;
                println!("{}: rejected", outcome.hook_name);
                println!("  reason: {e}");
                println!("  hint: {}", e.remediation());
            }
        }
    }
    for name in &disabled {
        println!("{name}: disabled");
    }

    if rejected > 0 {
        println!(
            "{rejected} of {} enabled hook{} rejected",
            outcomes.len(),
            if outcomes.len() == 1 { "" } else { "s" }
        );
        Ok(EXIT_FAILURE)
    } else {
        println!("manifest valid: {} enabled hook{}", outcomes.len(), if outcomes.len() == 1 { "" } else { "s" });
        Ok(EXIT_SUCCESS)
    }
}

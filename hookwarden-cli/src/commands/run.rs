//! `hookwarden run` - execute the hooks subscribed to one event.

use crate::context::ProjectContext;
use crate::error::{CliError, CliResult};
use crate::exit_codes::{EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SUCCESS};
use hookwarden_shell::{BatchReport, ExecutionResult, HookError, HookEvent, HookExecutor, HookRunner};
use std::io::Read;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Read the payload: nothing, standard input (`-`), or a file.
pub fn read_payload(source: Option<&str>) -> CliResult<Vec<u8>> {
    match source {
        None => Ok(Vec::new()),
        Some("-") => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|source| CliError::Payload {
                    origin: "stdin".to_string(),
                    source,
                })?;
            Ok(buf)
        }
        Some(path) => std::fs::read(path).map_err(|source| CliError::Payload {
            origin: path.to_string(),
            source,
        }),
    }
}

/// Run every hook subscribed to `event_type`.
pub async fn run_event(
    ctx: &ProjectContext,
    event_type: &str,
    payload: Option<&str>,
    event_id: Option<&str>,
) -> CliResult<i32> {
    let payload = read_payload(payload)?;
    let manifest = ctx.load_manifest()?;
    let audit = Arc::new(ctx.audit_logger(&manifest.audit)?);

    let cancel = CancellationToken::new();
    let executor = HookExecutor::new(&manifest, &ctx.project_root, audit).with_cancellation(cancel.clone());
    let runner = HookRunner::new(manifest, executor);
    let event = match event_id {
        Some(id) => HookEvent::with_id(id, event_type, payload),
        None => HookEvent::new(event_type, payload),
    };

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "hook_exec", "Interrupt received, cancelling the running hook");
            cancel.cancel();
        }
    });
    let report = runner.run_event(&event).await;
    interrupt.abort();

    print_report(&report);
    Ok(exit_code(&report))
}

/// Exit code for a finished batch.
pub fn exit_code(report: &BatchReport) -> i32 {
    let audit_failed = report
        .results
        .iter()
        .any(|r| matches!(r.error, Some(HookError::AuditWrite(_))));
    if report.cancelled {
        EXIT_INTERRUPTED
    } else if report.halted() || audit_failed {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

fn print_report(report: &BatchReport) {
    if report.is_empty() {
        println!("no hooks matched event '{}'", report.event_type);
        return;
    }
    for result in &report.results {
        print_result(result);
    }
    if let Some(name) = &report.halted_by {
        println!("stopped after '{name}' (fail_mode: stop)");
    }
    if report.cancelled {
        println!("cancelled by interrupt");
    }
}

fn print_result(result: &ExecutionResult) {
    println!(
        "{}: {} ({}ms)",
        result.hook_name,
        result.status(),
        result.duration_ms()
    );
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    let explain = result.halts_batch() || result.error.as_ref().is_some_and(|e| e.is_rejection());
    if explain {
        if let Some(reason) = result.reason() {
            println!("  reason: {reason}");
        }
        if let Some(hint) = result.remediation() {
            println!("  hint: {hint}");
        }
        for line in result.stderr.text.lines() {
            println!("  | {line}");
        }
    }
}

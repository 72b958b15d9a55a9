//! hookwarden CLI.
//!
//! Commands:
//! - `hookwarden validate`: schema check plus pre-flight of every enabled hook
//! - `hookwarden run <event-type> [--payload -|FILE]`: run the hooks for an event
//! - `hookwarden audit [--since DATE] [--security-report] [--json] [--prune]`
//! - `hookwarden list`: show hooks and their subscriptions
//!
//! Exit codes:
//! - 0: Success, or no hook matched
//! - 1: A `stop` hook failed, a hook was rejected, or an operational error
//! - 2: Manifest missing or invalid
//! - 130: Interrupted

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hookwarden::commands::audit::{run_audit, AuditOptions};
use hookwarden::commands::{list, run, validate};
use hookwarden::{Cli, CliResult, Commands, ProjectContext};

/// Filter used by `--debug`.
const DEBUG_FILTER: &str = "hookwarden=debug,hook_config=debug,hook_security=debug,hook_exec=debug,hook_audit=debug";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match dispatch_command(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(hint) = e.remediation() {
                eprintln!("hint: {hint}");
            }
            e.exit_code()
        }
    };
    std::process::exit(exit_code);
}

/// Dispatch a parsed CLI to the appropriate command handler.
async fn dispatch_command(cli: Cli) -> CliResult<i32> {
    let ctx = ProjectContext::resolve(cli.project_root.as_deref(), cli.manifest.as_deref())?;
    match cli.command {
        Commands::Validate => validate::run_validate(&ctx),
        Commands::Run {
            event_type,
            payload,
            event_id,
        } => run::run_event(&ctx, &event_type, payload.as_deref(), event_id.as_deref()).await,
        Commands::Audit {
            since,
            security_report,
            json,
            prune,
        } => run_audit(
            &ctx,
            &AuditOptions {
                since,
                security_report,
                json,
                prune,
            },
        ),
        Commands::List { json } => list::run_list(&ctx, json),
    }
}

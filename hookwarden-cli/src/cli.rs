//! CLI definition for the hookwarden command-line interface.
//!
//! Only depends on `clap` and `std`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// hookwarden - run repository hooks safely
///
/// Loads the hook manifest, validates every hook before it runs, executes
/// matching hooks with a scrubbed environment and a hard timeout, and keeps
/// an append-only audit log of every attempt.
#[derive(Parser, Debug)]
#[command(name = "hookwarden")]
#[command(version)]
#[command(about = "Run repository hooks under path, environment, and timeout controls")]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Project root (default: nearest ancestor with .git or .hookwarden)
    #[arg(long, global = true, value_name = "DIR")]
    pub project_root: Option<PathBuf>,

    /// Manifest file (default: .hookwarden/hooks.yaml, .yml, or .json)
    #[arg(long, global = true, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the manifest schema and pre-flight every enabled hook
    Validate,
    /// Run every hook subscribed to an event
    Run {
        /// Event type, e.g. vcs.commit
        event_type: String,
        /// Event payload: '-' for standard input, or a file path
        #[arg(long, value_name = "-|FILE")]
        payload: Option<String>,
        /// Event id (default: a new ULID)
        #[arg(long)]
        event_id: Option<String>,
    },
    /// Summarize the audit log
    Audit {
        /// Only entries at or after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        since: Option<String>,
        /// Show rejections, security events, and scanner warnings
        #[arg(long)]
        security_report: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Apply the retention policy and exit
        #[arg(long, conflicts_with_all = ["since", "security_report"])]
        prune: bool,
    },
    /// List hooks and the events they subscribe to
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_payload() {
        let cli = Cli::try_parse_from([
            "hookwarden",
            "--manifest",
            "m.yaml",
            "run",
            "vcs.commit",
            "--payload",
            "-",
        ])
        .unwrap();
        assert_eq!(cli.manifest, Some(PathBuf::from("m.yaml")));
        match cli.command {
            Commands::Run {
                event_type,
                payload,
                event_id,
            } => {
                assert_eq!(event_type, "vcs.commit");
                assert_eq!(payload.as_deref(), Some("-"));
                assert!(event_id.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_prune_conflicts_with_report() {
        assert!(Cli::try_parse_from(["hookwarden", "audit", "--prune", "--security-report"]).is_err());
    }
}

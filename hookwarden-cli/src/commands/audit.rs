//! `hookwarden audit` - summarize the audit log, report security findings,
//! or apply retention.

use super::table;
use crate::context::ProjectContext;
use crate::error::{CliError, CliResult};
use crate::exit_codes::EXIT_SUCCESS;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use hookwarden_audit::{AuditSummary, SecurityEvent, SecurityReport};
use hookwarden_common::{ErrorSeverity, HookStatus};
use std::time::Duration;

/// Options for the audit command.
#[derive(Debug, Default, Clone)]
pub struct AuditOptions {
    /// Only entries at or after this instant
    pub since: Option<String>,
    /// Show the security report instead of the summary
    pub security_report: bool,
    /// JSON output
    pub json: bool,
    /// Apply retention instead of reading
    pub prune: bool,
}

/// Parse `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub fn parse_since(value: &str) -> CliResult<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CliError::InvalidSince(value.to_string()))
}

/// Run the audit command.
pub fn run_audit(ctx: &ProjectContext, options: &AuditOptions) -> CliResult<i32> {
    let settings = ctx.audit_settings();
    let logger = ctx.audit_logger(&settings)?;

    if options.prune {
        let retention = Duration::from_secs(u64::from(settings.retention_days) * 24 * 60 * 60);
        let report = logger.prune(retention)?;
        logger.append_security_event(&SecurityEvent::new(
            "audit_pruned",
            ErrorSeverity::Warning,
            format!("audit retention applied ({} days)", settings.retention_days),
            serde_json::json!({
                "files_removed": report.files_removed,
                "records_removed": report.records_removed,
                "retention_days": settings.retention_days,
            }),
        ))?;
        if options.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "files_removed": report.files_removed,
                    "records_removed": report.records_removed,
                }))?
            );
        } else {
            println!(
                "pruned {} rotated file{} and {} record{} older than {} days",
                report.files_removed,
                plural(report.files_removed),
                report.records_removed,
                plural(report.records_removed),
                settings.retention_days
            );
        }
        return Ok(EXIT_SUCCESS);
    }

    let since = options.since.as_deref().map(parse_since).transpose()?;
    let log = logger.read(since)?;
    if log.malformed_lines > 0 {
        eprintln!(
            "note: skipped {} malformed line{} in {}",
            log.malformed_lines,
            plural(log.malformed_lines),
            logger.path().display()
        );
    }

    if options.security_report {
        let report = SecurityReport::from_entries(&log.entries);
        if options.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_security_report(&report);
        }
    } else {
        let summary = AuditSummary::from_entries(&log.entries);
        if options.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }
    }
    Ok(EXIT_SUCCESS)
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn print_summary(summary: &AuditSummary) {
    if summary.total_records == 0 && summary.security_events == 0 {
        println!("audit log is empty");
        return;
    }

    let mut statuses = table(vec!["Status", "Count"]);
    for status in HookStatus::ALL {
        statuses.add_row(vec![status.to_string(), summary.count(status).to_string()]);
    }
    println!("{statuses}");

    if !summary.by_hook.is_empty() {
        let mut hooks = table(vec!["Hook", "Runs", "Failures", "Avg ms"]);
        for (name, stats) in &summary.by_hook {
            hooks.add_row(vec![
                name.clone(),
                stats.runs.to_string(),
                stats.failures.to_string(),
                stats.average_duration_ms().to_string(),
            ]);
        }
        println!("{hooks}");
    }

    println!(
        "{} record{}, {} security event{}",
        summary.total_records,
        plural(summary.total_records),
        summary.security_events,
        plural(summary.security_events)
    );
}

fn print_security_report(report: &SecurityReport) {
    if report.is_empty() {
        println!("no security findings");
        return;
    }

    if !report.rejections.is_empty() {
        println!("Rejections");
        let mut rejections = table(vec!["Time", "Hook", "Event", "Reason"]);
        for record in &report.rejections {
            rejections.add_row(vec![
                timestamp(&record.timestamp),
                record.hook_name.clone(),
                record.event_type.clone(),
                record.reason.clone().unwrap_or_default(),
            ]);
        }
        println!("{rejections}");
    }

    if !report.security_events.is_empty() {
        println!("Security events");
        let mut events = table(vec!["Time", "Type", "Severity", "Description"]);
        for event in &report.security_events {
            events.add_row(vec![
                timestamp(&event.timestamp),
                event.event_type.clone(),
                event.severity.to_string(),
                event.description.clone(),
            ]);
        }
        println!("{events}");
    }

    if !report.warnings.is_empty() {
        println!("Scanner warnings");
        let mut warnings = table(vec!["Hook", "Event id", "Finding"]);
        for warned in &report.warnings {
            for finding in &warned.warnings {
                warnings.add_row(vec![
                    warned.hook_name.clone(),
                    warned.event_id.clone(),
                    finding.clone(),
                ]);
            }
        }
        println!("{warnings}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_since_date() {
        let ts = parse_since("2024-03-05").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 3, 5));
        assert_eq!(ts.hour(), 0);
    }

    #[test]
    fn test_parse_since_rfc3339() {
        let ts = parse_since("2024-03-05T10:30:00+02:00").unwrap();
        assert_eq!(ts.hour(), 8);
    }

    #[test]
    fn test_parse_since_rejects_garbage() {
        assert!(matches!(parse_since("last week"), Err(CliError::InvalidSince(_))));
    }
}

//! Aggregations over audit entries for the `audit` command.

use crate::record::{AuditEntry, AuditRecord, SecurityEvent};
use hookwarden_common::HookStatus;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-hook counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HookStats {
    /// Records for this hook, rejections included
    pub runs: usize,
    /// Records whose status is a failure
    pub failures: usize,
    /// Sum of `duration_ms`
    pub total_duration_ms: u64,
}

impl HookStats {
    /// Mean duration, zero when there are no runs.
    pub fn average_duration_ms(&self) -> u64 {
        if self.runs == 0 {
            0
        } else {
            self.total_duration_ms / self.runs as u64
        }
    }
}

/// Counts by status and by hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    /// Execution records considered
    pub total_records: usize,
    /// Security events considered
    pub security_events: usize,
    /// Records per status, in status order
    pub by_status: BTreeMap<String, usize>,
    /// Counters per hook, sorted by name
    pub by_hook: BTreeMap<String, HookStats>,
}

impl AuditSummary {
    /// Summarize a slice of entries.
    pub fn from_entries(entries: &[AuditEntry]) -> Self {
        let mut summary = Self::default();
        for status in HookStatus::ALL {
            summary.by_status.insert(status.as_str().to_string(), 0);
        }
        for entry in entries {
            match entry {
                AuditEntry::Execution(record) => summary.add_record(record),
                AuditEntry::Security(_) => summary.security_events += 1,
            }
        }
        summary
    }

    fn add_record(&mut self, record: &AuditRecord) {
        self.total_records += 1;
        *self
            .by_status
            .entry(record.status.as_str().to_string())
            .or_default() += 1;
        let stats = self.by_hook.entry(record.hook_name.clone()).or_default();
        stats.runs += 1;
        stats.total_duration_ms += record.duration_ms;
        if record.status.is_failure() {
            stats.failures += 1;
        }
    }

    /// Number of records with `status`.
    pub fn count(&self, status: HookStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

/// A record that carried advisory warnings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarnedRecord {
    /// Hook name
    pub hook_name: String,
    /// Event id
    pub event_id: String,
    /// Findings as written in the record
    pub warnings: Vec<String>,
}

/// Everything in the log a reviewer should look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecurityReport {
    /// Records with status `rejected`
    pub rejections: Vec<AuditRecord>,
    /// All security events
    pub security_events: Vec<SecurityEvent>,
    /// Records that carried at least one advisory warning
    pub warnings: Vec<WarnedRecord>,
}

impl SecurityReport {
    /// Collect the security-relevant entries.
    pub fn from_entries(entries: &[AuditEntry]) -> Self {
        let mut report = Self::default();
        for entry in entries {
            match entry {
                AuditEntry::Security(event) => report.security_events.push(event.clone()),
                AuditEntry::Execution(record) => {
                    if record.status == HookStatus::Rejected {
                        report.rejections.push(record.clone());
                    }
                    if !record.security_warnings.is_empty() {
                        report.warnings.push(WarnedRecord {
                            hook_name: record.hook_name.clone(),
                            event_id: record.event_id.clone(),
                            warnings: record.security_warnings.clone(),
                        });
                    }
                }
            }
        }
        report
    }

    /// True when there is nothing to report.
    pub fn is_empty(&self) -> bool {
        self.rejections.is_empty() && self.security_events.is_empty() && self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwarden_common::{ErrorSeverity, SecurityWarning};

    fn entries() -> Vec<AuditEntry> {
        vec![
            AuditEntry::Execution(
                AuditRecord::new("e1", "vcs.commit", "lint", HookStatus::Success)
                    .with_execution_result(Some(0), 100),
            ),
            AuditEntry::Execution(
                AuditRecord::new("e1", "vcs.commit", "test", HookStatus::Failed)
                    .with_execution_result(Some(1), 300),
            ),
            AuditEntry::Execution(
                AuditRecord::new("e2", "vcs.commit", "lint", HookStatus::Timeout)
                    .with_execution_result(None, 1000)
                    .with_warnings(&[SecurityWarning::new("fork-bomb", "recursive fork")]),
            ),
            AuditEntry::Execution(
                AuditRecord::new("e3", "vcs.commit", "evil", HookStatus::Rejected)
                    .with_reason("path traversal"),
            ),
            AuditEntry::Security(SecurityEvent::new(
                "manifest_invalid",
                ErrorSeverity::Critical,
                "bad manifest",
                serde_json::Value::Null,
            )),
        ]
    }

    #[test]
    fn test_summary_counts() {
        let summary = AuditSummary::from_entries(&entries());
        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.security_events, 1);
        assert_eq!(summary.count(HookStatus::Success), 1);
        assert_eq!(summary.count(HookStatus::Failed), 1);
        assert_eq!(summary.count(HookStatus::Timeout), 1);
        assert_eq!(summary.count(HookStatus::Rejected), 1);
        assert_eq!(summary.count(HookStatus::Error), 0);

        let lint = &summary.by_hook["lint"];
        assert_eq!(lint.runs, 2);
        assert_eq!(lint.failures, 1);
        assert_eq!(lint.average_duration_ms(), 550);
    }

    #[test]
    fn test_security_report() {
        let report = SecurityReport::from_entries(&entries());
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].hook_name, "evil");
        assert_eq!(report.security_events.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].warnings.len(), 1);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_empty_report() {
        assert!(SecurityReport::from_entries(&[]).is_empty());
        let summary = AuditSummary::from_entries(&[]);
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.by_status.len(), HookStatus::ALL.len());
    }
}

//! Advisory scan of hook contents for known-dangerous shell idioms.
//!
//! Findings never block execution. They are attached to the audit record and
//! printed for the operator.

use hookwarden_common::SecurityWarning;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Scripts larger than this are scanned only up to this many bytes.
const MAX_SCAN_BYTES: usize = 1024 * 1024;

/// One entry of the fixed pattern table.
#[derive(Debug, Clone, Copy)]
pub struct DangerousPattern {
    /// Stable identifier recorded in audit records
    pub id: &'static str,
    /// What the pattern indicates
    pub description: &'static str,
    /// Regular expression, matched per line
    pub pattern: &'static str,
}

/// The fixed pattern table.
pub const DANGEROUS_PATTERNS: &[DangerousPattern] = &[
    DangerousPattern {
        id: "rm-rf-root",
        description: "recursive delete of the filesystem root or home directory",
        pattern: r#"\brm\s+(?:-\S+\s+)*-\S*[rR]\S*\s+(?:-\S+\s+)*(?:--\s+)?["']?(?:/\*?|~/?|\$HOME/?)["']?(?:\s|;|&|\||$)"#,
    },
    DangerousPattern {
        id: "rm-no-preserve-root",
        description: "rm invoked with --no-preserve-root",
        pattern: r"\brm\s+[^\n]*--no-preserve-root",
    },
    DangerousPattern {
        id: "block-device-write",
        description: "raw write to a block device",
        pattern: r"(?:\bdd\s+[^\n]*\bof=|>\s*)/dev/(?:sd|hd|vd|xvd|nvme|mmcblk|disk|rdisk|md|dm-)",
    },
    DangerousPattern {
        id: "filesystem-format",
        description: "creates a filesystem, destroying existing data",
        pattern: r"\bmkfs(?:\.\w+)?\s",
    },
    DangerousPattern {
        id: "fork-bomb",
        description: "fork bomb",
        pattern: r":\s*\(\s*\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
    },
    DangerousPattern {
        id: "curl-pipe-shell",
        description: "pipes downloaded content into an interpreter",
        pattern: r"\b(?:curl|wget)\b[^|\n]*\|\s*(?:sudo\s+)?(?:ba|z|k|da)?sh\b|\b(?:curl|wget)\b[^|\n]*\|\s*(?:sudo\s+)?(?:python[0-9.]*|perl|ruby|node)\b",
    },
    DangerousPattern {
        id: "world-writable",
        description: "grants world-writable permissions",
        pattern: r"\bchmod\s+(?:-\S+\s+)*(?:[0-7]?[0-7][0-7][2367]\b|[ugo]*[oa][ugo]*[+=][rxXst]*w)",
    },
    DangerousPattern {
        id: "system-config-write",
        description: "writes into /etc",
        pattern: r"(?:>>?\s*|\btee\s+(?:-\S+\s+)*)/etc/",
    },
    DangerousPattern {
        id: "system-config-edit",
        description: "edits or replaces files under /etc",
        pattern: r"\b(?:sed\s+(?:-\S+\s+)*-i\S*|cp|mv|install|ln)\s[^\n]*\s/etc/",
    },
];

fn compiled() -> &'static [(DangerousPattern, Regex)] {
    static COMPILED: OnceLock<Vec<(DangerousPattern, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        DANGEROUS_PATTERNS
            .iter()
            .filter_map(|p| match Regex::new(p.pattern) {
                Ok(re) => Some((*p, re)),
                Err(e) => {
                    warn!(target: "hook_security", id = p.id, error = %e, "Skipping invalid scanner pattern");
                    None
                }
            })
            .collect()
    })
}

/// Scan `text` line by line. Pure; never fails.
///
/// Each pattern is reported at most once per line. Lines that are entirely a
/// shell comment are skipped.
pub fn scan(text: &str) -> Vec<SecurityWarning> {
    let mut findings = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        for (pattern, regex) in compiled() {
            if regex.is_match(line) {
                findings.push(SecurityWarning::new(pattern.id, pattern.description).at_line(index + 1));
            }
        }
    }
    if !findings.is_empty() {
        debug!(target: "hook_security", count = findings.len(), "Dangerous patterns found");
    }
    findings
}

/// Scan a script file. Unreadable files produce no findings.
pub fn scan_file(path: &Path) -> Vec<SecurityWarning> {
    match std::fs::read(path) {
        Ok(mut bytes) => {
            bytes.truncate(MAX_SCAN_BYTES);
            scan(&String::from_utf8_lossy(&bytes))
        }
        Err(e) => {
            debug!(target: "hook_security", path = %path.display(), error = %e, "Script not scanned");
            Vec::new()
        }
    }
}

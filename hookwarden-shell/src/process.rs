//! Child process supervision with process-group signal escalation.

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitid, Id, WaitPidFlag};
use nix::unistd::Pid;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Owns a spawned child that leads its own process group.
///
/// Terminating sends SIGTERM to the whole group, waits up to the grace
/// window, then sends SIGKILL and reaps. Dropping a guard whose child has not
/// been reaped kills the group immediately, so an aborted future never leaves
/// a process behind.
///
/// Leftover group members are always killed while the leader is an unreaped
/// zombie. Until it is reaped its pid, and with it the group id, cannot be
/// handed to another process.
#[derive(Debug)]
pub struct ProcessGuard {
    child: Option<Child>,
    pgid: Option<Pid>,
    label: String,
}

impl ProcessGuard {
    /// Wrap a child spawned with `process_group(0)`.
    pub fn new(child: Child, label: impl Into<String>) -> Self {
        let pgid = child
            .id()
            .and_then(|id| i32::try_from(id).ok())
            .map(Pid::from_raw);
        Self {
            child: Some(child),
            pgid,
            label: label.into(),
        }
    }

    /// Process group id, while known.
    pub fn pgid(&self) -> Option<Pid> {
        self.pgid
    }

    /// Wait for the group leader to exit, kill the rest of its group, then reap it.
    ///
    /// Cancel-safe: the child stays owned by the guard if this future is dropped.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        if self.child.is_none() {
            return Err(std::io::Error::other("process already reaped"));
        }
        if let Some(pid) = self.pgid {
            let exited = tokio::task::spawn_blocking(move || wait_exited(pid)).await;
            match exited {
                Ok(Ok(())) => self.signal_group(Signal::SIGKILL),
                Ok(Err(e)) => debug!(target: "hook_exec", hook = %self.label, error = %e, "waitid failed, reaping without a group sweep"),
                Err(e) => debug!(target: "hook_exec", hook = %self.label, error = %e, "waitid task failed"),
            }
        }
        match self.child.as_mut() {
            Some(child) => child.wait().await,
            None => Err(std::io::Error::other("process already reaped")),
        }
    }

    /// Send `signal` to every process in the group.
    pub fn signal_group(&self, signal: Signal) {
        let Some(pgid) = self.pgid else {
            return;
        };
        match killpg(pgid, signal) {
            Ok(()) => debug!(target: "hook_exec", pgid = pgid.as_raw(), ?signal, hook = %self.label, "Signalled process group"),
            // The group is already gone.
            Err(Errno::ESRCH) => {}
            Err(e) => warn!(target: "hook_exec", pgid = pgid.as_raw(), ?signal, error = %e, "Failed to signal process group"),
        }
    }

    /// SIGTERM the group, wait up to `grace`, then SIGKILL and reap.
    ///
    /// Returns once the leader has been reaped and the rest of the group has
    /// been sent SIGKILL.
    pub async fn terminate(&mut self, grace: Duration) -> std::io::Result<Option<ExitStatus>> {
        if self.child.is_none() {
            return Ok(None);
        }
        self.signal_group(Signal::SIGTERM);

        let status = match timeout(grace, self.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    target: "hook_exec",
                    hook = %self.label,
                    grace_ms = grace.as_millis() as u64,
                    "Grace window elapsed, sending SIGKILL"
                );
                self.signal_group(Signal::SIGKILL);
                if let Some(child) = self.child.as_mut() {
                    let _ = child.start_kill();
                }
                self.wait().await?
            }
        };
        self.finish();
        Ok(Some(status))
    }

    /// Forget the reaped leader.
    ///
    /// Call after a successful [`wait`](Self::wait); the group was already
    /// swept before the leader was reaped.
    pub fn finish(&mut self) {
        self.child = None;
        self.pgid = None;
    }
}

/// Block until `pid` has exited without reaping it.
fn wait_exited(pid: Pid) -> nix::Result<()> {
    loop {
        match waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Err(Errno::EINTR) => continue,
            other => return other.map(|_| ()),
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            warn!(target: "hook_exec", hook = %self.label, "Dropping guard with a live process, killing its group");
            self.signal_group(Signal::SIGKILL);
            let _ = child.start_kill();
        }
    }
}

//! Process-group termination for spawned tools.
//!
//! Tools are spawned as group leaders (`process_group(0)`), so the child's pid
//! is also its process group id and signalling the group reaches any
//! grandchildren the tool started.

use std::io;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::registry::ChildTerminator;

/// Signal to send when killing process groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KillSignal {
    /// Allows graceful shutdown.
    #[default]
    Term,
    Kill,
}

#[cfg(unix)]
impl KillSignal {
    fn as_nix(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal;
        match self {
            Self::Term => Signal::SIGTERM,
            Self::Kill => Signal::SIGKILL,
        }
    }
}

/// Result of a graceful termination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GracefulTerminationResult {
    /// Group exited after the initial signal.
    GracefulExit,
    /// Group survived the grace period and was sent SIGKILL.
    ForcefulKill,
    /// Group was already gone.
    AlreadyExited,
    Error,
}

/// Send `signal` to a process group. A group that no longer exists is not an error.
#[cfg(unix)]
pub fn signal_process_group(process_group_id: u32, signal: KillSignal) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let pgid = pid_from(process_group_id)?;
    match killpg(Pid::from_raw(pgid), signal.as_nix()) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
pub fn signal_process_group(_process_group_id: u32, _signal: KillSignal) -> io::Result<()> {
    Ok(())
}

/// Whether any process in the group is still alive.
#[cfg(unix)]
pub fn is_group_alive(process_group_id: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pgid) = pid_from(process_group_id) else {
        return false;
    };
    // Signal 0 probes for existence; EPERM means it exists but is not ours.
    match killpg(Pid::from_raw(pgid), None::<Signal>) {
        Ok(()) => true,
        Err(errno) => errno == Errno::EPERM,
    }
}

#[cfg(not(unix))]
pub fn is_group_alive(_process_group_id: u32) -> bool {
    false
}

#[cfg(unix)]
fn pid_from(process_group_id: u32) -> io::Result<i32> {
    i32::try_from(process_group_id)
        .ok()
        .filter(|pgid| *pgid > 1)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to signal process group {process_group_id}"),
            )
        })
}

/// SIGTERM the group, wait up to `grace_period`, then SIGKILL whatever is left.
pub async fn graceful_kill_process_group(
    process_group_id: u32,
    grace_period: Duration,
) -> GracefulTerminationResult {
    if !is_group_alive(process_group_id) {
        return GracefulTerminationResult::AlreadyExited;
    }

    if let Err(err) = signal_process_group(process_group_id, KillSignal::Term) {
        tracing::warn!(pgid = process_group_id, error = %err, "SIGTERM failed");
        return GracefulTerminationResult::Error;
    }

    let poll_interval = Duration::from_millis(10);
    let deadline = tokio::time::Instant::now() + grace_period;
    while tokio::time::Instant::now() < deadline {
        if !is_group_alive(process_group_id) {
            return GracefulTerminationResult::GracefulExit;
        }
        tokio::time::sleep(poll_interval).await;
    }

    if !is_group_alive(process_group_id) {
        return GracefulTerminationResult::GracefulExit;
    }
    match signal_process_group(process_group_id, KillSignal::Kill) {
        Ok(()) => GracefulTerminationResult::ForcefulKill,
        Err(err) => {
            tracing::warn!(pgid = process_group_id, error = %err, "SIGKILL failed");
            GracefulTerminationResult::Error
        }
    }
}

/// Terminator that runs [`graceful_kill_process_group`] on the runtime the
/// tool was spawned on, so `kill` returns immediately.
pub struct ProcessGroupTerminator {
    process_group_id: u32,
    grace_period: Duration,
    runtime: Handle,
}

impl ProcessGroupTerminator {
    pub fn new(process_group_id: u32, grace_period: Duration, runtime: Handle) -> Self {
        Self {
            process_group_id,
            grace_period,
            runtime,
        }
    }
}

impl ChildTerminator for ProcessGroupTerminator {
    fn kill(&mut self) -> io::Result<()> {
        let pgid = self.process_group_id;
        let grace_period = self.grace_period;
        self.runtime.spawn(async move {
            let result = graceful_kill_process_group(pgid, grace_period).await;
            tracing::debug!(pgid, ?result, "process group terminated");
        });
        Ok(())
    }
}

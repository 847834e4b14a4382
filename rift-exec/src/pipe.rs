//! Pipe-based spawning of tool processes.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Options for spawning a tool.
#[derive(Debug, Clone)]
pub struct PipeSpawnOptions {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when `None`.
    pub cwd: Option<PathBuf>,
}

impl PipeSpawnOptions {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }
}

/// A spawned tool with its output pipes detached from the child handle.
#[derive(Debug)]
pub struct SpawnedProcess {
    pub child: Child,
    pub pid: u32,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Spawn without a shell, with stdin closed, as leader of a new process group.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_piped(opts: &PipeSpawnOptions) -> io::Result<SpawnedProcess> {
    if opts.program.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "missing program for pipe spawn",
        ));
    }

    let mut command = Command::new(&opts.program);
    command
        .args(&opts.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);
    if let Some(cwd) = &opts.cwd {
        command.current_dir(cwd);
    }
    #[cfg(unix)]
    command.process_group(0);

    claim_pipes(command.spawn()?)
}

/// Take the pid and output pipes from a freshly spawned child, killing it
/// if any of them is missing.
fn claim_pipes(mut child: Child) -> io::Result<SpawnedProcess> {
    let (pid, stdout, stderr) = match take_pipes(&mut child) {
        Ok(parts) => parts,
        Err(err) => {
            if let Err(kill_err) = child.start_kill() {
                tracing::debug!(error = %kill_err, "failed to kill half-spawned process");
            }
            return Err(err);
        }
    };

    Ok(SpawnedProcess {
        child,
        pid,
        stdout,
        stderr,
    })
}

fn take_pipes(child: &mut Child) -> io::Result<(u32, ChildStdout, ChildStderr)> {
    let pid = child
        .id()
        .ok_or_else(|| io::Error::other("spawned process has no pid"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout pipe unavailable"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr pipe unavailable"))?;
    Ok((pid, stdout, stderr))
}

//! Tool invocation: gate, spawn, register, observe.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rift_config::ToolsConfig;
use rift_config::constants::tools as defaults;
use tokio::io::{AsyncRead, BufReader};
use tokio::process::Child;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::ExecError;
use crate::execution::{ExecutionId, OutputStream};
use crate::pipe::{PipeSpawnOptions, spawn_piped};
use crate::policy::ToolPolicy;
use crate::process_group::ProcessGroupTerminator;
use crate::registry::ExecutionRegistry;
use crate::stream::{ReadLineResult, chunk_from_line, read_line_with_limit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOptions {
    pub working_dir: Option<PathBuf>,
    pub max_line_bytes: usize,
    pub kill_grace: Duration,
    pub output_drain: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            working_dir: None,
            max_line_bytes: defaults::DEFAULT_MAX_LINE_BYTES,
            kill_grace: Duration::from_millis(defaults::DEFAULT_KILL_GRACE_MS),
            output_drain: Duration::from_millis(defaults::DEFAULT_OUTPUT_DRAIN_MS),
        }
    }
}

impl From<&ToolsConfig> for GatewayOptions {
    fn from(config: &ToolsConfig) -> Self {
        Self {
            working_dir: config.working_dir.clone(),
            max_line_bytes: config.max_line_bytes,
            kill_grace: Duration::from_millis(config.kill_grace_ms),
            output_drain: Duration::from_millis(config.output_drain_ms),
        }
    }
}

/// Split a raw argument string on whitespace, dropping empty tokens.
///
/// No quoting or shell expansion is applied.
pub fn split_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Launches allowed tools and wires their output into the registry.
pub struct ToolGateway {
    policy: Arc<dyn ToolPolicy>,
    registry: Arc<ExecutionRegistry>,
    options: GatewayOptions,
}

impl ToolGateway {
    pub fn new(
        policy: Arc<dyn ToolPolicy>,
        registry: Arc<ExecutionRegistry>,
        options: GatewayOptions,
    ) -> Self {
        Self {
            policy,
            registry,
            options,
        }
    }

    pub fn policy(&self) -> &Arc<dyn ToolPolicy> {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    /// Start `tool` with whitespace-split `args` and return without waiting.
    ///
    /// A rejected tool spawns nothing. A failed spawn leaves no registry entry.
    pub fn invoke(&self, tool: &str, args: &str) -> Result<ExecutionId, ExecError> {
        if !self.policy.permit(tool) {
            tracing::warn!(tool, "rejected tool outside the allow-list");
            return Err(ExecError::Forbidden {
                tool: tool.to_string(),
            });
        }

        let runtime = Handle::try_current().map_err(|err| ExecError::SpawnFailed {
            tool: tool.to_string(),
            source: std::io::Error::other(err),
        })?;

        let args = split_args(args);
        let opts = PipeSpawnOptions::new(tool)
            .args(args.iter().cloned())
            .cwd(self.options.working_dir.clone());
        let spawned = spawn_piped(&opts).map_err(|source| {
            tracing::warn!(tool, error = %source, "tool spawn failed");
            ExecError::SpawnFailed {
                tool: tool.to_string(),
                source,
            }
        })?;

        let id = self.registry.create(tool, args);
        self.registry.attach_terminator(
            id.as_str(),
            Box::new(ProcessGroupTerminator::new(
                spawned.pid,
                self.options.kill_grace,
                runtime.clone(),
            )),
        );
        tracing::info!(execution = %id, tool, pid = spawned.pid, "tool started");

        let stdout = runtime.spawn(observe_output(
            Arc::clone(&self.registry),
            id.clone(),
            OutputStream::Stdout,
            spawned.stdout,
            self.options.max_line_bytes,
        ));
        let stderr = runtime.spawn(observe_output(
            Arc::clone(&self.registry),
            id.clone(),
            OutputStream::Stderr,
            spawned.stderr,
            self.options.max_line_bytes,
        ));
        runtime.spawn(observe_exit(
            Arc::clone(&self.registry),
            id.clone(),
            spawned.child,
            [stdout, stderr],
            self.options.output_drain,
        ));

        Ok(id)
    }
}

async fn observe_output<R>(
    registry: Arc<ExecutionRegistry>,
    id: ExecutionId,
    stream: OutputStream,
    pipe: R,
    max_line_bytes: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        match read_line_with_limit(&mut reader, &mut buf, max_line_bytes).await {
            Ok(ReadLineResult::Line(line)) => {
                registry.append_output(id.as_str(), stream, chunk_from_line(&line));
            }
            Ok(ReadLineResult::Truncated(line)) => {
                tracing::debug!(execution = %id, stream = stream.as_str(), max_line_bytes, "output line truncated");
                registry.append_output(id.as_str(), stream, chunk_from_line(&line));
            }
            Ok(ReadLineResult::Eof) => break,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => {
                tracing::debug!(execution = %id, stream = stream.as_str(), error = %err, "output pipe read failed");
                break;
            }
        }
    }
}

async fn observe_exit(
    registry: Arc<ExecutionRegistry>,
    id: ExecutionId,
    mut child: Child,
    readers: [JoinHandle<()>; 2],
    drain: Duration,
) {
    let exit_code = match child.wait().await {
        // Signal-terminated processes have no code.
        Ok(status) => status.code().unwrap_or(-1),
        Err(err) => {
            tracing::warn!(execution = %id, error = %err, "failed to wait for tool");
            -1
        }
    };

    // Background children may inherit the pipes and keep them open past exit.
    let deadline = tokio::time::Instant::now() + drain;
    for mut reader in readers {
        match tokio::time::timeout_at(deadline, &mut reader).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(execution = %id, error = %err, "output observer aborted");
            }
            Err(_) => {
                tracing::debug!(execution = %id, drain_ms = drain.as_millis(), "output pipe still open after exit, abandoning");
                reader.abort();
            }
        }
    }

    registry.complete(id.as_str(), exit_code);
}

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use rift::{ControlPlane, ExecutionView};

/// Exit status reported when the execution was cancelled.
const CANCELLED_EXIT: u8 = 130;

#[derive(Debug, Clone, Copy)]
pub struct RunCommandOptions {
    pub poll_ms: u64,
    pub json: bool,
}

/// Start a tool, then poll its status and print new output as it appears.
pub async fn handle_run_command(
    plane: &ControlPlane,
    tool: &str,
    args: &[String],
    options: RunCommandOptions,
) -> Result<ExitCode> {
    let id = plane
        .run_tool(tool, &args.join(" "))
        .with_context(|| format!("Failed to start `{tool}`"))?;
    tracing::info!(execution = %id, tool, "following execution");

    let mut interval = tokio::time::interval(Duration::from_millis(options.poll_ms));
    let mut printed = OutputCursor::default();
    let mut aborted = false;

    let view = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c(), if !aborted => {
                signal.context("Failed to listen for Ctrl+C")?;
                aborted = true;
                let outcome = plane.abort_tool(id.as_str());
                tracing::warn!(execution = %id, ?outcome, "abort requested");
            }
            _ = interval.tick() => {}
        }

        let view = plane.get_tool_status(id.as_str())?;
        if !options.json {
            printed.print_new(&view)?;
        }
        if view.status.is_terminal() {
            break view;
        }
    };

    if options.json {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &view).context("Failed to encode execution")?;
        writeln!(stdout)?;
    }

    Ok(ExitCode::from(exit_status_for(&view)))
}

#[derive(Debug, Default)]
struct OutputCursor {
    stdout: usize,
    stderr: usize,
}

impl OutputCursor {
    fn print_new(&mut self, view: &ExecutionView) -> Result<()> {
        if let Some(fresh) = view.stdout.get(self.stdout..)
            && !fresh.is_empty()
        {
            let mut out = io::stdout().lock();
            out.write_all(fresh.as_bytes())?;
            out.flush()?;
            self.stdout = view.stdout.len();
        }
        if let Some(fresh) = view.stderr.get(self.stderr..)
            && !fresh.is_empty()
        {
            let mut err = io::stderr().lock();
            err.write_all(fresh.as_bytes())?;
            err.flush()?;
            self.stderr = view.stderr.len();
        }
        Ok(())
    }
}

fn exit_status_for(view: &ExecutionView) -> u8 {
    if view.cancelled {
        return CANCELLED_EXIT;
    }
    match view.exit_code {
        Some(code) => u8::try_from(code).unwrap_or(1),
        None => 1,
    }
}

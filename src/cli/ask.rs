use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use futures::StreamExt;
use rift::ControlPlane;

/// `EX_TEMPFAIL` from sysexits.
const TEMPFAIL: u8 = 75;

/// Stream a completion to stdout. Ctrl+C cancels the session and keeps
/// whatever was already printed.
pub async fn handle_ask_command(
    plane: &ControlPlane,
    channel: &str,
    prompt: &str,
) -> Result<ExitCode> {
    let mut tokens = plane
        .send_ai_message_on(channel, prompt)
        .context("Completion request rejected")?;

    let mut stdout = io::stdout();
    let mut printed_any = false;
    let mut cancelled = false;

    loop {
        let next = tokio::select! {
            signal = tokio::signal::ctrl_c(), if !cancelled => {
                signal.context("Failed to listen for Ctrl+C")?;
                cancelled = plane.cancel_ai_on(channel);
                continue;
            }
            next = tokens.next() => next,
        };

        let Some(item) = next else {
            break;
        };
        let text = match item {
            Ok(text) => text,
            Err(err) if err.is_retryable() => {
                if printed_any {
                    writeln!(stdout)?;
                }
                tracing::warn!(channel, error = %err, "completion failed, backend may recover");
                eprintln!("{err} (temporary, retry once the backend is reachable)");
                return Ok(ExitCode::from(TEMPFAIL));
            }
            Err(err) => return Err(err).context("Completion stream failed"),
        };
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        printed_any = true;
    }

    if printed_any {
        writeln!(stdout)?;
    }
    if cancelled {
        tracing::info!(channel, "completion cancelled");
        return Ok(ExitCode::from(130));
    }
    Ok(ExitCode::SUCCESS)
}

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use rift::ControlPlane;

pub fn handle_tools_command(plane: &ControlPlane, json: bool) -> Result<ExitCode> {
    let tools = plane.list_tools();
    let mut stdout = io::stdout().lock();

    if json {
        serde_json::to_writer_pretty(&mut stdout, &tools).context("Failed to encode tool list")?;
        writeln!(stdout)?;
        return Ok(ExitCode::SUCCESS);
    }

    let width = tools.iter().map(|tool| tool.name.len()).max().unwrap_or(0);
    for tool in &tools {
        let location = tool
            .path
            .as_ref()
            .map_or_else(|| "not installed".to_string(), |path| path.display().to_string());
        writeln!(stdout, "{:<width$}  {location}", tool.name)?;
    }
    Ok(ExitCode::SUCCESS)
}

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use rift::ControlPlane;
use serde_json::json;

pub async fn handle_models_command(plane: &ControlPlane, json: bool) -> Result<ExitCode> {
    let health = plane.backend_health().await;
    let models = if health.available {
        plane
            .list_models()
            .await
            .context("Failed to list installed models")?
    } else {
        Vec::new()
    };

    let mut stdout = io::stdout().lock();
    if json {
        let document = json!({ "backend": health, "models": models });
        serde_json::to_writer_pretty(&mut stdout, &document)
            .context("Failed to encode model list")?;
        writeln!(stdout)?;
    } else {
        let state = match (health.enabled, health.available) {
            (false, _) => "disabled",
            (true, true) => "available",
            (true, false) => "unreachable",
        };
        writeln!(stdout, "backend  {} ({state})", health.base_url)?;
        writeln!(stdout, "model    {}", health.model)?;
        for model in &models {
            let marker = if model.name == health.model { "*" } else { " " };
            writeln!(stdout, "{marker} {}", model.name)?;
        }
    }

    if health.enabled && !health.available {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

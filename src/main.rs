//! rift - execution and streaming control plane CLI
//!
//! Thin binary entry point that delegates to the handlers in `cli`.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rift::ControlPlane;
use rift_config::{ConfigBuilder, ConfigManager, DebugConfig};

mod cli;

use cli::args::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    let manager = load_config(&args)?;
    initialize_tracing(&manager.config().debug);
    if let Some(path) = manager.config_path() {
        tracing::debug!(path = %path.display(), "configuration loaded");
    }

    let plane = ControlPlane::new(manager.into_config())?;
    cli::dispatch(&plane, args.command).await
}

fn load_config(args: &Cli) -> Result<ConfigManager> {
    let mut builder = ConfigBuilder::new().cli_overrides(&args.overrides);
    if let Some(file) = &args.config {
        builder = builder.config_file(file.clone());
    }
    if let Some(workspace) = &args.workspace {
        builder = builder.workspace(workspace.clone());
    }
    builder.build().context("Failed to load rift configuration")
}

/// `RUST_LOG` wins; otherwise the `[debug]` section decides. Logs go to stderr.
fn initialize_tracing(debug: &DebugConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(debug.filter_directive()));

    let initialized = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if initialized.is_ok() {
        let trace_level = &debug.trace_level;
        tracing::debug!(level = %trace_level, "tracing initialized");
    }
}

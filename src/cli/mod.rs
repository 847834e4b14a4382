use std::process::ExitCode;

use anyhow::Result;
use rift::ControlPlane;

pub mod args;
mod ask;
mod models;
mod run;
mod tools;

use args::Commands;

pub async fn dispatch(plane: &ControlPlane, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Tools { json } => tools::handle_tools_command(plane, json),
        Commands::Run {
            tool,
            args,
            poll_ms,
            json,
        } => {
            let options = run::RunCommandOptions { poll_ms, json };
            run::handle_run_command(plane, &tool, &args, options).await
        }
        Commands::Ask { channel, prompt } => {
            ask::handle_ask_command(plane, &channel, &prompt.join(" ")).await
        }
        Commands::Models { json } => models::handle_models_command(plane, json).await,
    }
}

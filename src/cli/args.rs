use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rift::DEFAULT_CHANNEL;

#[derive(Debug, Parser)]
#[command(
    name = "rift",
    version,
    about = "Run allow-listed security tools and stream answers from a local LLM"
)]
pub struct Cli {
    /// Configuration file to use instead of <workspace>/rift.toml
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Workspace directory whose rift.toml is loaded
    #[arg(long, global = true, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Override a configuration key, e.g. `-c inference.model=llama3`
    #[arg(short = 'c', long = "set", global = true, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub overrides: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List allowed tools and whether they are installed
    Tools {
        #[arg(long)]
        json: bool,
    },

    /// Run an allowed tool and follow its output until it exits
    Run {
        /// Status poll interval in milliseconds
        #[arg(long, default_value_t = 250, value_parser = clap::value_parser!(u64).range(10..))]
        poll_ms: u64,

        /// Print the final execution record as JSON
        #[arg(long)]
        json: bool,

        tool: String,

        /// Arguments passed to the tool (split on whitespace, no shell)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Stream a completion from the local model
    Ask {
        /// Session channel; a new ask on the same channel replaces the old one
        #[arg(long, default_value = DEFAULT_CHANNEL)]
        channel: String,

        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// Show backend availability and installed models
    Models {
        #[arg(long)]
        json: bool,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_keeps_hyphenated_tool_args() {
        let cli = Cli::try_parse_from(["rift", "run", "--poll-ms", "50", "nmap", "-sV", "-p", "22", "host"])
            .expect("valid args");
        match cli.command {
            Commands::Run {
                tool,
                args,
                poll_ms,
                json,
            } => {
                assert_eq!(tool, "nmap");
                assert_eq!(args, vec!["-sV", "-p", "22", "host"]);
                assert_eq!(poll_ms, 50);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_overrides_parse_key_value_pairs() {
        let cli = Cli::try_parse_from([
            "rift",
            "ask",
            "-c",
            "inference.model=llama3",
            "what",
            "now",
        ])
        .expect("valid args");
        assert_eq!(
            cli.overrides,
            vec![("inference.model".to_string(), "llama3".to_string())]
        );
        match cli.command {
            Commands::Ask { channel, prompt } => {
                assert_eq!(channel, DEFAULT_CHANNEL);
                assert_eq!(prompt, vec!["what", "now"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn malformed_override_is_rejected() {
        assert!(Cli::try_parse_from(["rift", "-c", "novalue", "tools"]).is_err());
        assert!(Cli::try_parse_from(["rift", "-c", "=x", "tools"]).is_err());
    }
}

use std::path::PathBuf;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::constants::tools as defaults;

/// Settings for spawning allow-listed tools.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Exact tool names that may be spawned. Anything else is forbidden.
    #[serde(default = "ToolsConfig::default_allowed")]
    pub allowed: Vec<String>,
    /// Working directory for spawned tools. Inherits the caller's when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Longest output line kept per chunk; the remainder of the line is dropped.
    #[serde(default = "ToolsConfig::default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Delay between SIGTERM and SIGKILL when an execution is cancelled.
    #[serde(default = "ToolsConfig::default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    /// How long to keep reading output after the tool exits. Pipes held open
    /// by background children are abandoned once this elapses.
    #[serde(default = "ToolsConfig::default_output_drain_ms")]
    pub output_drain_ms: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            allowed: Self::default_allowed(),
            working_dir: None,
            max_line_bytes: Self::default_max_line_bytes(),
            kill_grace_ms: Self::default_kill_grace_ms(),
            output_drain_ms: Self::default_output_drain_ms(),
        }
    }
}

impl ToolsConfig {
    fn default_allowed() -> Vec<String> {
        defaults::DEFAULT_ALLOWED
            .iter()
            .map(|name| (*name).to_string())
            .collect()
    }

    const fn default_max_line_bytes() -> usize {
        defaults::DEFAULT_MAX_LINE_BYTES
    }

    const fn default_kill_grace_ms() -> u64 {
        defaults::DEFAULT_KILL_GRACE_MS
    }

    const fn default_output_drain_ms() -> u64 {
        defaults::DEFAULT_OUTPUT_DRAIN_MS
    }

    pub fn validate(&self) -> Result<()> {
        for name in &self.allowed {
            ensure!(
                !name.trim().is_empty(),
                "tools.allowed must not contain empty names"
            );
            ensure!(
                !name.chars().any(char::is_whitespace),
                "tools.allowed entry `{name}` must not contain whitespace"
            );
        }
        ensure!(
            self.max_line_bytes >= 256,
            "tools.max_line_bytes must be at least 256"
        );
        if let Some(dir) = &self.working_dir {
            ensure!(
                dir.is_dir(),
                "tools.working_dir `{}` is not a directory",
                dir.display()
            );
        }
        Ok(())
    }
}

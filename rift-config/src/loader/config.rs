use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::debug::DebugConfig;
use crate::inference::InferenceConfig;
use crate::tools::ToolsConfig;

/// Effective configuration after all layers are merged.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RiftConfig {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl RiftConfig {
    pub fn validate(&self) -> Result<()> {
        self.tools
            .validate()
            .context("Invalid [tools] configuration")?;
        self.inference
            .validate()
            .context("Invalid [inference] configuration")?;
        Ok(())
    }
}

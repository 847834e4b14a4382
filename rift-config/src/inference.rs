use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::constants::inference as defaults;

/// Local inference backend settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InferenceConfig {
    /// Master switch; when false every completion request is refused.
    #[serde(default = "InferenceConfig::default_enabled")]
    pub enabled: bool,
    /// Root URL of the Ollama-compatible server (no `/api` suffix needed).
    #[serde(default = "InferenceConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "InferenceConfig::default_model")]
    pub model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Upper bound on prompt length, counted in characters.
    #[serde(default = "InferenceConfig::default_max_prompt_chars")]
    pub max_prompt_chars: usize,
    #[serde(default = "InferenceConfig::default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            system_prompt: None,
            max_prompt_chars: Self::default_max_prompt_chars(),
            connect_timeout_seconds: Self::default_connect_timeout_seconds(),
            options: GenerationOptions::default(),
        }
    }
}

impl InferenceConfig {
    const fn default_enabled() -> bool {
        true
    }

    fn default_base_url() -> String {
        defaults::DEFAULT_BASE_URL.to_string()
    }

    fn default_model() -> String {
        defaults::DEFAULT_MODEL.to_string()
    }

    const fn default_max_prompt_chars() -> usize {
        defaults::DEFAULT_MAX_PROMPT_CHARS
    }

    const fn default_connect_timeout_seconds() -> u64 {
        defaults::DEFAULT_CONNECT_TIMEOUT_SECONDS
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.base_url.trim();
        ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "inference.base_url must be an http(s) URL, got `{}`",
            self.base_url
        );
        ensure!(
            !self.model.trim().is_empty(),
            "inference.model must not be empty"
        );
        ensure!(
            self.max_prompt_chars > 0,
            "inference.max_prompt_chars must be at least 1"
        );
        ensure!(
            self.connect_timeout_seconds > 0,
            "inference.connect_timeout_seconds must be at least 1"
        );
        self.options.validate()
    }
}

/// Sampling options forwarded verbatim in the request's `options` object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerationOptions {
    #[serde(default = "GenerationOptions::default_temperature")]
    pub temperature: f32,
    #[serde(default = "GenerationOptions::default_top_p")]
    pub top_p: f32,
    #[serde(default = "GenerationOptions::default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "GenerationOptions::default_repeat_penalty")]
    pub repeat_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: Self::default_temperature(),
            top_p: Self::default_top_p(),
            num_ctx: Self::default_num_ctx(),
            repeat_penalty: Self::default_repeat_penalty(),
        }
    }
}

impl GenerationOptions {
    const fn default_temperature() -> f32 {
        defaults::DEFAULT_TEMPERATURE
    }

    const fn default_top_p() -> f32 {
        defaults::DEFAULT_TOP_P
    }

    const fn default_num_ctx() -> u32 {
        defaults::DEFAULT_NUM_CTX
    }

    const fn default_repeat_penalty() -> f32 {
        defaults::DEFAULT_REPEAT_PENALTY
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=2.0).contains(&self.temperature),
            "inference.options.temperature must be between 0.0 and 2.0"
        );
        ensure!(
            self.top_p > 0.0 && self.top_p <= 1.0,
            "inference.options.top_p must be in (0.0, 1.0]"
        );
        ensure!(
            self.num_ctx >= 256,
            "inference.options.num_ctx must be at least 256"
        );
        Ok(())
    }
}

//! Tracing configuration

use serde::{Deserialize, Serialize};

use crate::constants::debug as defaults;

/// Trace level for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl TraceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

impl std::fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Unknown levels fall back to the default instead of failing the whole load.
impl<'de> Deserialize<'de> for TraceLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw).unwrap_or_default())
    }
}

/// Tracing configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DebugConfig {
    /// Trace level (error, warn, info, debug, trace)
    #[serde(default)]
    pub trace_level: TraceLevel,

    /// Tracing targets the level applies to
    #[serde(default = "DebugConfig::default_trace_targets")]
    pub trace_targets: Vec<String>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            trace_level: TraceLevel::default(),
            trace_targets: Self::default_trace_targets(),
        }
    }
}

impl DebugConfig {
    fn default_trace_targets() -> Vec<String> {
        defaults::DEFAULT_TRACE_TARGETS
            .iter()
            .map(|target| (*target).to_string())
            .collect()
    }

    /// Filter directive in `EnvFilter` syntax, e.g. `rift=info,rift_exec=info`.
    pub fn filter_directive(&self) -> String {
        let level = self.trace_level.as_str();
        if self.trace_targets.is_empty() {
            return level.to_string();
        }
        self.trace_targets
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

use std::io;

use thiserror::Error;

/// Failures surfaced to callers of the execution APIs.
///
/// Runtime failures of a spawned tool are not errors here; they show up as a
/// `failed` execution status instead.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("tool `{tool}` is not in the allow-list")]
    Forbidden { tool: String },

    #[error("failed to spawn `{tool}`: {source}")]
    SpawnFailed {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("execution `{id}` not found")]
    NotFound { id: String },
}

impl ExecError {
    /// Short machine-readable label for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "forbidden",
            Self::SpawnFailed { .. } => "spawn_failed",
            Self::NotFound { .. } => "not_found",
        }
    }
}

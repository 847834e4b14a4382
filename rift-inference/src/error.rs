use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("AI features are disabled in configuration")]
    Disabled,

    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("inference backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend reported an error inside the stream.
    #[error("inference backend error: {0}")]
    Backend(String),

    /// The stream ended before the backend signalled completion.
    #[error("completion stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl InferenceError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::StreamInterrupted(_)
        )
    }
}

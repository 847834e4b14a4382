//! Per-channel streaming completion proxy.
//!
//! Each caller channel has at most one live session. Starting a new session
//! on a channel cancels the previous one; cancellation ends that session's
//! stream without an error item.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use rift_config::InferenceConfig;
use tokio_util::sync::CancellationToken;

use crate::backend::{CompletionBackend, CompletionRequest, ModelInfo};
use crate::error::InferenceError;
use crate::ndjson::{NdjsonDecoder, StreamEvent};

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, InferenceError>> + Send>>;

/// Channel used when the caller does not name one.
pub const DEFAULT_CHANNEL: &str = "default";

struct Session {
    id: u64,
    token: CancellationToken,
}

type SessionMap = Arc<Mutex<HashMap<String, Session>>>;

/// Removes the channel's session when its stream ends or is dropped,
/// unless a newer session has replaced it.
struct SessionGuard {
    sessions: SessionMap,
    channel: String,
    id: u64,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut sessions = self.sessions.lock();
        if sessions
            .get(&self.channel)
            .is_some_and(|session| session.id == self.id)
        {
            sessions.remove(&self.channel);
        }
    }
}

pub struct CompletionProxy {
    backend: Arc<dyn CompletionBackend>,
    config: InferenceConfig,
    sessions: SessionMap,
    next_session: AtomicU64,
}

impl CompletionProxy {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: InferenceConfig) -> Self {
        Self {
            backend,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_session: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn validate_prompt(&self, prompt: &str) -> Result<(), InferenceError> {
        if prompt.trim().is_empty() {
            return Err(InferenceError::InvalidPrompt(
                "prompt must not be empty".to_string(),
            ));
        }
        let chars = prompt.chars().count();
        if chars > self.config.max_prompt_chars {
            return Err(InferenceError::InvalidPrompt(format!(
                "prompt is {chars} characters, limit is {}",
                self.config.max_prompt_chars
            )));
        }
        Ok(())
    }

    /// Start a completion on `channel`, cancelling any session already there.
    ///
    /// Validation happens before anything else, so an invalid prompt neither
    /// contacts the backend nor disturbs the channel's live session. The
    /// returned stream connects lazily on first poll; backend failures arrive
    /// as its first item.
    pub fn send(&self, channel: &str, prompt: &str) -> Result<TokenStream, InferenceError> {
        if !self.config.enabled {
            return Err(InferenceError::Disabled);
        }
        self.validate_prompt(prompt)?;

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self.sessions.lock().insert(
            channel.to_string(),
            Session {
                id,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(channel, session = previous.id, "replacing live completion session");
            previous.token.cancel();
        }

        let guard = SessionGuard {
            sessions: Arc::clone(&self.sessions),
            channel: channel.to_string(),
            id,
        };
        let request = CompletionRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            system: self.config.system_prompt.clone(),
            stream: true,
            options: self.config.options.clone(),
        };
        tracing::info!(channel, session = id, model = %request.model, "completion session started");

        Ok(completion_stream(
            Arc::clone(&self.backend),
            request,
            token,
            guard,
        ))
    }

    /// Cancel the live session on `channel`. Returns whether one existed.
    pub fn cancel(&self, channel: &str) -> bool {
        let session = self.sessions.lock().remove(channel);
        match session {
            Some(session) => {
                tracing::info!(channel, session = session.id, "completion session cancelled");
                session.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn active_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.sessions.lock().keys().cloned().collect();
        channels.sort();
        channels
    }

    pub async fn backend_available(&self) -> bool {
        self.backend.is_available().await
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, InferenceError> {
        self.backend.list_models().await
    }
}

fn completion_stream(
    backend: Arc<dyn CompletionBackend>,
    request: CompletionRequest,
    token: CancellationToken,
    guard: SessionGuard,
) -> TokenStream {
    let stream = try_stream! {
        let session = guard.id;

        let opened = tokio::select! {
            biased;
            () = token.cancelled() => None,
            opened = backend.open(&request) => Some(opened),
        };

        if let Some(opened) = opened {
            let mut body = opened?;
            let mut decoder = NdjsonDecoder::new();
            let mut yielded = 0usize;

            'read: loop {
                let next = tokio::select! {
                    biased;
                    () = token.cancelled() => None,
                    item = body.next() => Some(item),
                };
                let Some(item) = next else {
                    tracing::debug!(session, yielded, pending = decoder.pending(), "completion stream cancelled");
                    break;
                };

                let (events, at_eof) = match item {
                    Some(chunk) => (decoder.push(&chunk?), false),
                    None => (decoder.finish(), true),
                };

                for event in events {
                    match event {
                        StreamEvent::Token(text) => {
                            // A chunk can decode into several tokens; drop the rest once cancelled.
                            if token.is_cancelled() {
                                tracing::debug!(session, yielded, "completion stream cancelled mid-chunk");
                                break 'read;
                            }
                            yielded += 1;
                            yield text;
                        }
                        StreamEvent::Done => {
                            tracing::debug!(session, yielded, "completion stream finished");
                        }
                        StreamEvent::Error(message) => {
                            Err::<(), _>(InferenceError::Backend(message))?;
                        }
                    }
                }

                if decoder.is_finished() {
                    break;
                }
                if at_eof {
                    Err::<(), _>(InferenceError::StreamInterrupted(format!(
                        "backend closed the stream after {yielded} tokens without completing"
                    )))?;
                }
            }
        } else {
            tracing::debug!(session, "completion cancelled before connecting");
        }

        drop(guard);
    };

    Box::pin(stream)
}

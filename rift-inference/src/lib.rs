//! Streaming completion proxy for a local inference backend.

pub mod backend;
pub mod error;
pub mod ndjson;
pub mod proxy;

pub use backend::{ByteStream, CompletionBackend, CompletionRequest, ModelInfo, OllamaBackend};
pub use error::InferenceError;
pub use ndjson::{NdjsonDecoder, StreamEvent};
pub use proxy::{CompletionProxy, DEFAULT_CHANNEL, TokenStream};

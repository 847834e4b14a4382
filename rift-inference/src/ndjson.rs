//! Incremental decoder for newline-delimited JSON completion streams.
//!
//! Lines are assembled at the byte level, so a multi-byte UTF-8 sequence split
//! across two network chunks is decoded once the line is complete.

use serde::Deserialize;

/// Decoded item from the backend stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Token(String),
    /// The backend sent its `done` sentinel.
    Done,
    /// The backend reported an error in-band.
    Error(String),
}

#[derive(Debug, Default, Deserialize)]
struct Frame {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<MessageFrame>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageFrame {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `Done` or `Error` has been produced; later input is ignored.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        if self.finished || bytes.is_empty() {
            return Vec::new();
        }
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while !self.finished {
            let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.process_line(&line, &mut events);
        }
        if self.finished {
            self.buffer.clear();
        }
        events
    }

    /// Flush a trailing line that had no newline at end of stream.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let line = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        if !self.finished {
            self.process_line(&line, &mut events);
        }
        events
    }

    fn process_line(&mut self, line: &[u8], events: &mut Vec<StreamEvent>) {
        let content = line.trim_ascii();
        if content.is_empty() {
            return;
        }

        let frame: Frame = match serde_json::from_slice(content) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(error = %err, bytes = content.len(), "skipping malformed stream line");
                return;
            }
        };

        if let Some(message) = frame.error {
            self.finished = true;
            events.push(StreamEvent::Error(message));
            return;
        }

        let text = frame
            .response
            .or_else(|| frame.message.and_then(|message| message.content));
        if let Some(text) = text
            && !text.is_empty()
        {
            events.push(StreamEvent::Token(text));
        }

        if frame.done {
            self.finished = true;
            events.push(StreamEvent::Done);
        }
    }
}

//! Streaming chat-completion support: SSE line decoding and the
//! `FragmentSource` seam the accumulator reads from.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::warn;

use crate::llm_client::LlmError;

/// End-of-stream marker sent as `data: [DONE]`.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded unit of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Fragment(String),
    /// Explicit end-of-stream sentinel. Nothing after it is read.
    End,
    /// The upstream reported an error inside the stream.
    Failed(String),
}

/// An ordered source of text fragments. `Ok(None)` means the stream ended.
#[async_trait]
pub trait FragmentSource: Send {
    async fn next_fragment(&mut self) -> Result<Option<String>, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// SSE decoding
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    message: String,
}

/// Splits a byte stream into SSE lines and decodes the `data:` ones.
///
/// Bytes are buffered until a newline arrives, so multi-byte UTF-8 sequences
/// split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamItem> {
        self.buffer.extend_from_slice(bytes);
        let mut items = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            items.extend(decode_line(&String::from_utf8_lossy(&line)));
        }
        items
    }

    /// Decodes a trailing line that never got its newline.
    pub fn finish(&mut self) -> Vec<StreamItem> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&rest))
            .into_iter()
            .collect()
    }
}

fn decode_line(line: &str) -> Option<StreamItem> {
    let line = line.trim_end_matches(['\r', '\n']);
    // Blank keep-alives and `: comment` lines carry no data.
    let data = line.strip_prefix("data:")?.trim_start();
    if data == DONE_SENTINEL {
        return Some(StreamItem::End);
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(StreamChunk {
            error: Some(error), ..
        }) => Some(StreamItem::Failed(error.message)),
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(StreamItem::Fragment),
        Err(e) => {
            warn!("Failed to parse streaming response line ({e}): {data}");
            None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP-backed source
// ────────────────────────────────────────────────────────────────────────────

/// Fragments read from a live streaming response.
pub struct CompletionStream {
    response: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<StreamItem>,
    idle_timeout: Duration,
    finished: bool,
}

impl CompletionStream {
    pub(crate) fn new(response: reqwest::Response, idle_timeout: Duration) -> Self {
        Self {
            response,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            idle_timeout,
            finished: false,
        }
    }
}

#[async_trait]
impl FragmentSource for CompletionStream {
    async fn next_fragment(&mut self) -> Result<Option<String>, LlmError> {
        loop {
            match self.pending.pop_front() {
                Some(StreamItem::Fragment(text)) => return Ok(Some(text)),
                Some(StreamItem::End) => {
                    self.finished = true;
                    self.pending.clear();
                    return Ok(None);
                }
                Some(StreamItem::Failed(message)) => return Err(LlmError::Stream(message)),
                None if self.finished => return Ok(None),
                None => {}
            }

            let chunk: Option<Bytes> = tokio::time::timeout(self.idle_timeout, self.response.chunk())
                .await
                .map_err(|_| LlmError::Timeout {
                    secs: self.idle_timeout.as_secs(),
                })??;

            match chunk {
                Some(bytes) => {
                    let items = self.decoder.push(&bytes);
                    self.pending.extend(items);
                }
                None => {
                    let items = self.decoder.finish();
                    self.pending.extend(items);
                    self.finished = true;
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Test double
// ────────────────────────────────────────────────────────────────────────────

/// In-memory fragment source for tests.
#[cfg(test)]
pub struct ScriptedFragments {
    items: VecDeque<StreamItem>,
    fail_at_end: bool,
    ended: bool,
}

#[cfg(test)]
impl ScriptedFragments {
    pub fn new(items: Vec<StreamItem>) -> Self {
        Self {
            items: items.into(),
            fail_at_end: false,
            ended: false,
        }
    }

    pub fn text(fragments: &[&str]) -> Self {
        Self::new(
            fragments
                .iter()
                .map(|f| StreamItem::Fragment(f.to_string()))
                .collect(),
        )
    }

    /// Yields `fragments`, then fails with an idle timeout.
    pub fn failing_after(fragments: &[&str]) -> Self {
        Self {
            fail_at_end: true,
            ..Self::text(fragments)
        }
    }
}

#[cfg(test)]
#[async_trait]
impl FragmentSource for ScriptedFragments {
    async fn next_fragment(&mut self) -> Result<Option<String>, LlmError> {
        if self.ended {
            return Ok(None);
        }
        match self.items.pop_front() {
            Some(StreamItem::Fragment(text)) => Ok(Some(text)),
            Some(StreamItem::End) => {
                self.ended = true;
                Ok(None)
            }
            Some(StreamItem::Failed(message)) => Err(LlmError::Stream(message)),
            None if self.fail_at_end => Err(LlmError::Timeout { secs: 30 }),
            None => Ok(None),
        }
    }
}

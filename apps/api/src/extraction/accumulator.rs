//! Streamed text accumulator: concatenates model output fragments in arrival
//! order and reports a chunk event for each one.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::llm_client::stream::FragmentSource;
use crate::llm_client::LlmError;

/// Emitted once per non-empty fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkEvent {
    /// The fragment just appended.
    pub content: String,
    /// The full buffer after appending `content`.
    pub accumulated: String,
}

/// Growing text buffer for one in-flight model response.
///
/// Fragments are appended synchronously in the order they are fed. The
/// accumulator has no terminal state of its own: whoever stops feeding it
/// (end of stream, sentinel, cancellation) calls `finish` to take the text.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: String,
    fragments: usize,
}

impl StreamAccumulator {
    pub fn start() -> Self {
        Self::default()
    }

    /// Appends `fragment`. Empty fragments are ignored and produce no event.
    pub fn feed(&mut self, fragment: &str) -> Option<ChunkEvent> {
        if fragment.is_empty() {
            return None;
        }
        self.buffer.push_str(fragment);
        self.fragments += 1;
        Some(ChunkEvent {
            content: fragment.to_string(),
            accumulated: self.buffer.clone(),
        })
    }

    pub fn fragments_consumed(&self) -> usize {
        self.fragments
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Result of draining a fragment source into an accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainOutcome {
    pub text: String,
    pub fragments: usize,
    /// True when the event receiver went away before the source ended.
    pub cancelled: bool,
}

/// Pulls fragments from `source` until it ends, forwarding a chunk event per
/// fragment to `events`.
///
/// A closed `events` channel is the cancellation signal. It is checked before
/// every fetch, and a failed send also stops the drain; in both cases the text
/// gathered so far is returned as a normal outcome with `cancelled` set.
pub async fn drain_stream<S, T>(
    source: &mut S,
    events: &mpsc::Sender<T>,
) -> Result<DrainOutcome, LlmError>
where
    S: FragmentSource + ?Sized,
    T: From<ChunkEvent>,
{
    let mut accumulator = StreamAccumulator::start();
    let mut cancelled = false;

    loop {
        if events.is_closed() {
            cancelled = true;
            break;
        }

        let Some(fragment) = source.next_fragment().await? else {
            break;
        };

        if let Some(event) = accumulator.feed(&fragment) {
            if events.send(T::from(event)).await.is_err() {
                cancelled = true;
                break;
            }
        }
    }

    let fragments = accumulator.fragments_consumed();
    debug!(fragments, cancelled, "Fragment stream drained");

    Ok(DrainOutcome {
        text: accumulator.finish(),
        fragments,
        cancelled,
    })
}

//! SSE framing for provider responses.
//!
//! Network chunks do not line up with SSE lines, so bytes are buffered until a
//! full line is available. Each `data:` payload is then decoded best-effort:
//! a payload that is not a well-formed completion chunk is dropped and the
//! stream continues.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use super::{FragmentStream, UpstreamError};

/// End-of-stream sentinel used by OpenAI-compatible providers.
const DONE_SENTINEL: &str = "[DONE]";

/// One complete SSE line of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A `data:` payload with the prefix stripped.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Byte buffer that yields complete SSE lines.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns the frames of every line now complete.
    /// A trailing partial line stays buffered.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(frame) = parse_line(&line[..line.len() - 1]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Parses whatever is left once the byte stream has ended.
    pub fn flush(&mut self) -> Vec<SseFrame> {
        let rest = mem::take(&mut self.buffer);
        parse_line(&rest).into_iter().collect()
    }
}

/// Parses one line without its `\n`. Comments, other SSE fields, blank lines
/// and invalid UTF-8 yield nothing.
fn parse_line(line: &[u8]) -> Option<SseFrame> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim_end_matches('\r'),
        Err(_) => {
            tracing::debug!("Skipping upstream line with invalid UTF-8");
            return None;
        }
    };

    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.trim() == DONE_SENTINEL {
        return Some(SseFrame::Done);
    }
    if data.trim().is_empty() {
        return None;
    }
    Some(SseFrame::Data(data.to_string()))
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChoicePayload>,
}

#[derive(Debug, Deserialize)]
struct ChoicePayload {
    #[serde(default)]
    delta: Option<DeltaPayload>,
}

#[derive(Debug, Deserialize)]
struct DeltaPayload {
    #[serde(default)]
    content: Option<String>,
}

/// Extracts `choices[0].delta.content` from a chunk payload.
///
/// Returns `None` for malformed JSON and for chunks without text, such as
/// role announcements or usage trailers.
pub fn decode_delta(data: &str) -> Option<String> {
    let payload: ChunkPayload = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!("Skipping malformed upstream frame: {}", e);
            return None;
        }
    };

    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty())
}

struct FragmentState<E> {
    bytes: Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>,
    lines: SseLineBuffer,
    pending: VecDeque<String>,
    finished: bool,
    idle_timeout: Duration,
}

impl<E> FragmentState<E> {
    /// Queues fragments from `frames`, stopping at the sentinel.
    fn absorb(&mut self, frames: Vec<SseFrame>) {
        for frame in frames {
            match frame {
                SseFrame::Data(data) => {
                    if let Some(fragment) = decode_delta(&data) {
                        self.pending.push_back(fragment);
                    }
                }
                SseFrame::Done => {
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Turns a raw provider byte stream into a fragment stream.
///
/// Each wait for the next network chunk is bounded by `idle_timeout`; a stall
/// yields [`UpstreamError::Timeout`] and ends the stream.
pub fn fragment_stream<S, E>(bytes: S, idle_timeout: Duration) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = FragmentState {
        bytes: Box::pin(bytes),
        lines: SseLineBuffer::new(),
        pending: VecDeque::new(),
        finished: false,
        idle_timeout,
    };

    let stream = unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }

            match tokio::time::timeout(state.idle_timeout, state.bytes.next()).await {
                Ok(Some(Ok(chunk))) => {
                    let frames = state.lines.feed(&chunk);
                    state.absorb(frames);
                }
                Ok(Some(Err(e))) => {
                    state.finished = true;
                    state.pending.clear();
                    return Some((Err(UpstreamError::Transport(e.to_string())), state));
                }
                Ok(None) => {
                    let frames = state.lines.flush();
                    state.absorb(frames);
                    state.finished = true;
                }
                Err(_) => {
                    state.finished = true;
                    state.pending.clear();
                    let timeout = state.idle_timeout;
                    return Some((Err(UpstreamError::Timeout(timeout)), state));
                }
            }
        }
    });

    Box::pin(stream)
}

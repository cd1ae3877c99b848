//! Outbound event protocol for a conversion stream.
//!
//! Every accepted conversion produces `id`, then zero or more `chunk`, then
//! exactly one of `done` or `error`. [`StreamEncoder`] enforces that order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// The only error message callers ever see after a stream has started.
pub const CONVERSION_FAILED: &str = "Conversion failed";

/// One event on the conversion stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Id { id: Uuid },
    Chunk { content: String },
    Done { html: String, id: Uuid },
    Error { message: String },
}

impl StreamEvent {
    /// Serializes the event as a single line of JSON.
    pub fn to_json(&self) -> String {
        // Every variant is a plain map of strings and UUIDs.
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"type":"error","message":"{}"}}"#, CONVERSION_FAILED)
        })
    }

    /// True for `done` and `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// The caller went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Destination for stream events.
#[async_trait]
pub trait EventSink: Send {
    /// Delivers one event, waiting while the consumer is behind.
    async fn emit(&mut self, event: StreamEvent) -> Result<(), SinkClosed>;

    /// True once the consumer has disconnected.
    fn is_closed(&self) -> bool;
}

/// Sink backed by a bounded channel that feeds the HTTP response.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&mut self, event: StreamEvent) -> Result<(), SinkClosed> {
        self.tx.send(event).await.map_err(|_| SinkClosed)
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Encoder states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Init,
    Streaming,
    Done,
    Failed,
}

impl EncoderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EncoderState::Done | EncoderState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncoderError {
    #[error("event sink closed")]
    Closed,

    #[error("cannot emit {event} in state {state:?}")]
    InvalidTransition {
        state: EncoderState,
        event: &'static str,
    },
}

impl From<SinkClosed> for EncoderError {
    fn from(_: SinkClosed) -> Self {
        EncoderError::Closed
    }
}

/// Writes the event sequence of one conversion to a sink.
pub struct StreamEncoder<S> {
    sink: S,
    state: EncoderState,
    id: Option<Uuid>,
}

impl<S: EventSink> StreamEncoder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: EncoderState::Init,
            id: None,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// True once the consumer has disconnected.
    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    fn require(&self, expected: EncoderState, event: &'static str) -> Result<(), EncoderError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EncoderError::InvalidTransition {
                state: self.state,
                event,
            })
        }
    }

    /// Emits the `id` event and enters `Streaming`.
    pub async fn open(&mut self, id: Uuid) -> Result<(), EncoderError> {
        self.require(EncoderState::Init, "id")?;
        self.state = EncoderState::Streaming;
        self.id = Some(id);
        self.sink.emit(StreamEvent::Id { id }).await?;
        Ok(())
    }

    /// Emits one `chunk` event.
    pub async fn chunk(&mut self, content: impl Into<String>) -> Result<(), EncoderError> {
        self.require(EncoderState::Streaming, "chunk")?;
        self.sink
            .emit(StreamEvent::Chunk {
                content: content.into(),
            })
            .await?;
        Ok(())
    }

    /// Emits the terminal `done` event for the id given to [`Self::open`].
    pub async fn done(&mut self, html: impl Into<String>) -> Result<(), EncoderError> {
        self.require(EncoderState::Streaming, "done")?;
        let id = self.id.ok_or(EncoderError::InvalidTransition {
            state: self.state,
            event: "done",
        })?;
        self.state = EncoderState::Done;
        self.sink
            .emit(StreamEvent::Done {
                html: html.into(),
                id,
            })
            .await?;
        Ok(())
    }

    /// Emits the terminal `error` event with the stable message.
    pub async fn fail(&mut self) -> Result<(), EncoderError> {
        self.require(EncoderState::Streaming, "error")?;
        self.state = EncoderState::Failed;
        self.sink
            .emit(StreamEvent::Error {
                message: CONVERSION_FAILED.to_string(),
            })
            .await?;
        Ok(())
    }
}

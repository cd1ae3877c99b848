//! Forwards upstream fragments to the caller while accumulating them.

use futures_util::StreamExt;

use crate::protocol::{EncoderError, EventSink, StreamEncoder};
use crate::upstream::{FragmentStream, UpstreamError};

/// Why a relay stopped before the upstream stream ended.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("caller disconnected")]
    Disconnected,

    #[error("stream encoder rejected chunk: {0}")]
    Encoder(EncoderError),
}

impl From<EncoderError> for RelayError {
    fn from(e: EncoderError) -> Self {
        match e {
            EncoderError::Closed => RelayError::Disconnected,
            other => RelayError::Encoder(other),
        }
    }
}

/// Drains `fragments`, emitting a `chunk` for each non-empty fragment in
/// arrival order. Returns the concatenated text.
///
/// Stops reading upstream as soon as an emit fails. The fragment stream is
/// dropped on return, which closes the upstream connection.
pub async fn relay<S: EventSink>(
    mut fragments: FragmentStream,
    encoder: &mut StreamEncoder<S>,
) -> Result<String, RelayError> {
    let mut accumulated = String::new();
    let mut count = 0usize;

    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        if fragment.is_empty() {
            continue;
        }
        accumulated.push_str(&fragment);
        encoder.chunk(fragment).await?;
        count += 1;
    }

    tracing::debug!(chunks = count, bytes = accumulated.len(), "Upstream stream drained");
    Ok(accumulated)
}

//! The conversion pipeline: upstream, relay, formatter, store, in that order.
//!
//! One [`Pipeline::run`] call drives one conversion from the `id` event to
//! its terminal event. Everything that goes wrong after the `id` event is
//! logged here and reported to the caller only as a generic `error` event.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::format::{self, FormatError};
use crate::models::conversion::{Conversion, NewConversion};
use crate::protocol::{EncoderError, EventSink, StreamEncoder};
use crate::relay::{relay, RelayError};
use crate::store::{ConversionStore, StoreError};
use crate::upstream::{CompletionClient, CompletionRequest, UpstreamError};

/// A quota-approved conversion request.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Minted before the stream starts; becomes the stored row's key.
    pub id: Uuid,
    pub owner: String,
    /// Validated `data:image/...;base64,...` URL.
    pub image_data_url: String,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Persisted and `done` emitted.
    Completed(Conversion),
    /// `error` emitted; nothing persisted.
    Failed,
    /// The caller left; nothing persisted.
    Cancelled,
}

/// Failures after the stream has committed.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("upstream: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("formatting: {0}")]
    Format(#[from] FormatError),

    #[error("persistence: {0}")]
    Store(#[from] StoreError),

    #[error("encoder: {0}")]
    Encoder(EncoderError),

    #[error("caller disconnected")]
    Cancelled,
}

impl From<RelayError> for ConversionError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Upstream(e) => ConversionError::Upstream(e),
            RelayError::Disconnected => ConversionError::Cancelled,
            RelayError::Encoder(e) => ConversionError::Encoder(e),
        }
    }
}

/// Shared, stateless conversion driver.
pub struct Pipeline {
    store: Arc<dyn ConversionStore>,
    upstream: Arc<dyn CompletionClient>,
    model: String,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ConversionStore>,
        upstream: Arc<dyn CompletionClient>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            upstream,
            model: model.into(),
        }
    }

    /// Runs one conversion to its terminal event.
    pub async fn run<S: EventSink>(&self, job: ConversionJob, sink: S) -> Outcome {
        let started = Instant::now();
        let mut encoder = StreamEncoder::new(sink);

        if encoder.open(job.id).await.is_err() {
            tracing::info!(id = %job.id, "Caller left before the stream opened");
            return Outcome::Cancelled;
        }

        match self.convert(&job, &mut encoder).await {
            Ok(conversion) => {
                if encoder.done(conversion.markup.clone()).await.is_err() {
                    tracing::info!(id = %job.id, "Caller left before the done event");
                }
                tracing::info!(
                    id = %job.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    bytes = conversion.markup.len(),
                    "Conversion completed"
                );
                Outcome::Completed(conversion)
            }
            Err(ConversionError::Cancelled) => {
                tracing::info!(
                    id = %job.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Conversion cancelled by caller"
                );
                Outcome::Cancelled
            }
            Err(e) => {
                tracing::error!(
                    id = %job.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Conversion failed: {}",
                    e
                );
                if encoder.fail().await.is_err() {
                    tracing::debug!(id = %job.id, "Caller left before the error event");
                }
                Outcome::Failed
            }
        }
    }

    async fn convert<S: EventSink>(
        &self,
        job: &ConversionJob,
        encoder: &mut StreamEncoder<S>,
    ) -> Result<Conversion, ConversionError> {
        let request = CompletionRequest::new(self.model.as_str(), job.image_data_url.as_str());
        let fragments = self.upstream.stream_completion(request).await?;

        let raw = relay(fragments, encoder).await?;
        let markup = format::canonicalize(&raw)?;

        // A caller that is gone would never see `done`.
        if encoder.is_closed() {
            return Err(ConversionError::Cancelled);
        }

        let conversion = self
            .store
            .insert(NewConversion {
                id: job.id,
                owner: job.owner.clone(),
                markup,
            })
            .await?;

        Ok(conversion)
    }
}

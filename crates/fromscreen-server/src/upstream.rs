//! Upstream chat-completion client.
//!
//! The pipeline only sees [`CompletionClient`] and the lazy
//! [`FragmentStream`] it returns. [`openrouter::OpenRouterClient`] is the one
//! concrete adapter.

pub mod frame;
pub mod openrouter;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;

pub use openrouter::{OpenRouterClient, OpenRouterConfig};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "moonshotai/kimi-k2.5";

/// Instruction sent alongside every screenshot.
pub const SYSTEM_PROMPT: &str = "You are an expert frontend developer. Rebuild the UI in this screenshot as clean, production-ready markup.

Rules:
- Style with Tailwind CSS utility classes only. No inline styles and no custom CSS.
- Match colors, spacing and layout closely. Use arbitrary values such as bg-[#1a2b3c] when needed.
- Use semantic HTML. Use placeholder divs for images and suggest Lucide icon names in comments.
- Make the layout responsive.
- Do not include any JavaScript or <script> elements.
- Reply with the HTML only. No markdown fences and no explanation.";

/// Incremental text fragments from the provider, in arrival order.
///
/// The stream is finite and cannot be restarted. An `Err` item is terminal.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

/// Errors from the upstream provider. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream stream aborted: {0}")]
    Transport(String),

    #[error("upstream sent nothing for {0:?}")]
    Timeout(Duration),
}

/// One screenshot-to-markup completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Resolved model identifier.
    pub model: String,
    /// Instruction text.
    pub prompt: String,
    /// `data:image/...;base64,...` URL of the screenshot.
    pub image_data_url: String,
}

impl CompletionRequest {
    /// Builds a request with the standard instruction.
    pub fn new(model: impl Into<String>, image_data_url: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: SYSTEM_PROMPT.to_string(),
            image_data_url: image_data_url.into(),
        }
    }
}

/// A provider that streams a completion for a screenshot.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Opens the streaming request. Status and connection failures are
    /// returned here; failures after the first byte arrive in the stream.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<FragmentStream, UpstreamError>;
}

/// Returns the configured model, or [`DEFAULT_MODEL`] when unset or blank.
pub fn resolve_model(configured: Option<&str>) -> String {
    match configured.map(str::trim) {
        Some(model) if !model.is_empty() => model.to_string(),
        _ => DEFAULT_MODEL.to_string(),
    }
}

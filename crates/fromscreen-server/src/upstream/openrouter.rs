//! OpenRouter chat-completion adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::frame::fragment_stream;
use super::{CompletionClient, CompletionRequest, FragmentStream, UpstreamError};

/// Default OpenRouter API root.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Title reported to OpenRouter for attribution.
const APP_TITLE: &str = "fromscreen.dev";

/// Maximum bytes of an error body kept for logging.
const MAX_ERROR_BODY: usize = 2048;

/// Connection settings for [`OpenRouterClient`].
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    /// API root without the trailing `/chat/completions`.
    pub base_url: String,
    /// Sent as `HTTP-Referer`.
    pub site_url: String,
    pub connect_timeout: Duration,
    /// Longest wait for the next chunk of the response body.
    pub idle_timeout: Duration,
}

impl OpenRouterConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            site_url: "http://localhost:3000".to_string(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

/// Streams completions from an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    config: OpenRouterConfig,
}

impl OpenRouterClient {
    pub fn new(config: OpenRouterConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

fn request_body(request: &CompletionRequest) -> ChatCompletionBody<'_> {
    ChatCompletionBody {
        model: &request.model,
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text {
                    text: &request.prompt,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: &request.image_data_url,
                    },
                },
            ],
        }],
        stream: true,
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<FragmentStream, UpstreamError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", &self.config.site_url)
            .header("X-Title", APP_TITLE)
            .json(&request_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        tracing::debug!(model = %request.model, "Upstream stream opened");
        Ok(fragment_stream(
            response.bytes_stream(),
            self.config.idle_timeout,
        ))
    }
}

/// First `MAX_ERROR_BODY` bytes of an error body, cut on a char boundary.
fn truncate_body(body: &str) -> String {
    body.char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= MAX_ERROR_BODY)
        .map(|(_, c)| c)
        .collect()
}

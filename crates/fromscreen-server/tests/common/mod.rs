//! Shared helpers for router integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use futures_util::stream;
use serde_json::Value;
use tower::ServiceExt;

use fromscreen_server::pipeline::Pipeline;
use fromscreen_server::quota::{MemoryQuota, QuotaPolicy, QuotaService};
use fromscreen_server::state::Settings;
use fromscreen_server::store::{ConversionStore, MemoryConversionStore};
use fromscreen_server::upstream::{
    CompletionClient, CompletionRequest, FragmentStream, UpstreamError,
};
use fromscreen_server::{create_router, AppState};

/// A small valid screenshot payload.
pub const IMAGE: &str = "data:image/png;base64,AAAA";

/// Completion client that replays fixed fragments, or rejects every call.
pub struct FakeClient {
    fragments: Vec<String>,
    reject: bool,
    calls: AtomicUsize,
}

impl FakeClient {
    pub fn streaming(fragments: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            reject: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            fragments: Vec::new(),
            reject: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for FakeClient {
    async fn stream_completion(
        &self,
        _request: CompletionRequest,
    ) -> Result<FragmentStream, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(UpstreamError::Status {
                status: 500,
                body: "internal provider error: key sk-secret".to_string(),
            });
        }
        let items: Vec<Result<String, UpstreamError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Builds a router over in-memory stores and the given client.
pub fn app_with(client: Arc<FakeClient>) -> Router {
    let store: Arc<dyn ConversionStore> = Arc::new(MemoryConversionStore::new());
    let quota: Arc<dyn QuotaService> = Arc::new(MemoryQuota::new(QuotaPolicy::default()));
    app_with_services(client, store, quota)
}

pub fn app_with_services(
    client: Arc<FakeClient>,
    store: Arc<dyn ConversionStore>,
    quota: Arc<dyn QuotaService>,
) -> Router {
    let pipeline = Pipeline::new(store.clone(), client, "test/model");
    create_router(AppState::new(store, quota, pipeline, Settings::default()))
}

/// Sends a conversion request, optionally with a session cookie.
pub async fn post_conversion(app: &Router, body: Value, cookie: Option<&str>) -> Response {
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/v1/conversions/stream")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }

    app.clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .expect("Failed to send conversion request")
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    app.clone()
        .oneshot(request)
        .await
        .expect("Failed to send request")
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }

    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .expect("Failed to send request")
}

pub async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    String::from_utf8(body.to_vec()).expect("Body is not UTF-8")
}

pub async fn json_body(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).expect("Failed to parse JSON response")
}

/// Reads an event stream to its end and returns the JSON of each event.
pub async fn sse_events(response: Response) -> Vec<Value> {
    body_text(response)
        .await
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("Event is not JSON"))
        .collect()
}

/// `name=value` part of the response's `Set-Cookie` header.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

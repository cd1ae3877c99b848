//! Conversion endpoints: the streaming conversion and read-back.

use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::attach_session;
use crate::error::AppError;
use crate::image::ImagePayload;
use crate::models::conversion::Conversion;
use crate::pipeline::ConversionJob;
use crate::protocol::ChannelSink;
use crate::quota::{QuotaDecision, CONVERSION_COST};
use crate::session::Session;
use crate::state::AppState;
use crate::store::MAX_HISTORY_LIMIT;

/// Outbound events buffered per stream. One keeps a slow caller in control
/// of how fast upstream is read.
const EVENT_BUFFER: usize = 1;

/// Creates the conversions router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.settings.request_body_limit();
    Router::new()
        .route("/", get(list_conversions))
        .route(
            "/stream",
            post(stream_conversion).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/{id}", get(get_conversion))
        .with_state(state)
}

/// Request body for a conversion.
#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    /// `data:image/<type>;base64,<payload>`
    pub image: String,
}

/// A stored conversion as returned to callers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionView {
    pub id: Uuid,
    pub markup: String,
    pub created_at: String,
}

impl From<Conversion> for ConversionView {
    fn from(conversion: Conversion) -> Self {
        Self {
            id: conversion.id,
            markup: conversion.markup,
            created_at: conversion.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub conversion: ConversionView,
}

#[derive(Debug, Serialize)]
pub struct ConversionListResponse {
    pub conversions: Vec<ConversionView>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// POST /api/v1/conversions/stream
///
/// Validates the screenshot and charges the quota, then answers with an
/// event stream. Everything after that point is reported in the stream.
async fn stream_conversion(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let session = Session::from_headers(&headers);

    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let image = ImagePayload::from_data_url(&request.image, state.settings.max_image_bytes)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let owner = session.owner();
    match state.quota.check_and_consume(&owner, CONVERSION_COST).await? {
        QuotaDecision::Allow { remaining } => {
            tracing::debug!(remaining, "Quota charged");
        }
        QuotaDecision::Deny { retry_after } => {
            tracing::warn!(retry_after, "Conversion quota exhausted");
            return Err(AppError::TooManyRequests {
                message: "Rate limit exceeded. Try again later.".to_string(),
                retry_after,
            });
        }
    }

    let job = ConversionJob {
        id: Uuid::new_v4(),
        owner,
        image_data_url: image.to_data_url(),
    };
    tracing::info!(id = %job.id, mime = %image.mime, bytes = image.bytes.len(), "Conversion accepted");

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline.run(job, ChannelSink::new(tx)).await;
    });

    let events = ReceiverStream::new(rx)
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())));
    let response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();

    Ok(attach_session(response, &session, state.settings.secure_cookies))
}

/// GET /api/v1/conversions/{id}
async fn get_conversion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversionResponse>, AppError> {
    let conversion = state
        .store
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Conversion not found".to_string()))?;

    Ok(Json(ConversionResponse {
        conversion: conversion.into(),
    }))
}

/// GET /api/v1/conversions?limit=N
///
/// Most recent conversions first.
async fn list_conversions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ConversionListResponse>, AppError> {
    let limit = query.limit.unwrap_or(MAX_HISTORY_LIMIT);
    let conversions = state.store.recent(limit).await?;

    Ok(Json(ConversionListResponse {
        conversions: conversions.into_iter().map(ConversionView::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_conversion_view_shape() {
        let conversion = Conversion {
            id: Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            owner: "owner-a".to_string(),
            markup: "<p>hi</p>\n".to_string(),
            preview_image: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        };

        let json = serde_json::to_value(ConversionResponse {
            conversion: conversion.into(),
        })
        .unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "conversion": {
                    "id": "550e8400-e29b-41d4-a716-446655440000",
                    "markup": "<p>hi</p>\n",
                    "createdAt": "2026-01-02T03:04:05+00:00"
                }
            })
        );
    }
}

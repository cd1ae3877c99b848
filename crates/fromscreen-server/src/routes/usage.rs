//! Quota read endpoint.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::attach_session;
use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

/// Creates the usage router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_usage))
        .with_state(state)
}

/// GET /api/v1/usage
///
/// Returns `{ count, limit, remaining, hasReachedLimit }` for the caller's
/// session without consuming anything.
async fn get_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session = Session::from_headers(&headers);
    let snapshot = state.quota.usage(&session.owner()).await?;

    Ok(attach_session(
        Json(snapshot).into_response(),
        &session,
        state.settings.secure_cookies,
    ))
}

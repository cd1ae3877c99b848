//! API routes for the fromscreen server.

pub mod conversions;
pub mod preview;
pub mod usage;

use axum::http::header::SET_COOKIE;
use axum::response::Response;
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::session::Session;
use crate::state::AppState;

/// Creates the main API router with all routes mounted.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Creates the v1 API routes.
fn api_v1_routes(state: AppState) -> Router {
    Router::new()
        .nest("/conversions", conversions::router(state.clone()))
        .nest("/usage", usage::router(state.clone()))
        .nest("/preview", preview::router(state))
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

/// Stores a freshly minted session in the browser.
fn attach_session(mut response: Response, session: &Session, secure: bool) -> Response {
    if session.is_new {
        if let Some(cookie) = session.set_cookie(secure) {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
    }
    response
}

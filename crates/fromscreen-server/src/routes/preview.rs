//! Rendered previews of stored conversions and of ad hoc markup.

use std::sync::LazyLock;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Creates the preview router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(render_preview))
        .route("/{id}", get(get_preview))
        .with_state(state)
}

static SCRIPT_ELEMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: <script src="x"></script>, <SCRIPT>...</SCRIPT >
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").ok()
});

static UNCLOSED_SCRIPT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: a <script ...> left over without a closing tag
    Regex::new(r"(?is)<script\b[^>]*>").ok()
});

static EVENT_HANDLER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: onclick="...", onload='...', onerror=alert(1)
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).ok()
});

static JAVASCRIPT_SCHEME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").ok());

fn strip(pattern: &LazyLock<Option<Regex>>, text: String) -> String {
    match pattern.as_ref() {
        Some(re) => re.replace_all(&text, "").into_owned(),
        None => text,
    }
}

/// Removes script elements, inline event handlers and `javascript:` URLs.
pub fn sanitize(markup: &str) -> String {
    let text = strip(&SCRIPT_ELEMENT, markup.to_string());
    let text = strip(&UNCLOSED_SCRIPT, text);
    let text = strip(&EVENT_HANDLER, text);
    strip(&JAVASCRIPT_SCHEME, text)
}

/// Wraps sanitized markup in a page that loads the Tailwind runtime.
pub fn render_page(markup: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Preview</title>
    <script src="https://cdn.tailwindcss.com"></script>
  </head>
  <body>
{}
  </body>
</html>
"#,
        sanitize(markup)
    )
}

/// GET /api/v1/preview/{id}
async fn get_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let conversion = state
        .store
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Conversion not found".to_string()))?;

    Ok(Html(render_page(&conversion.markup)))
}

/// Request body for an ad hoc preview.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub html: String,
}

/// POST /api/v1/preview
///
/// Renders caller-supplied markup without storing it.
async fn render_preview(
    body: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<Html<String>, AppError> {
    let invalid = || AppError::BadRequest("Invalid HTML provided".to_string());
    let Json(request) = body.map_err(|_| invalid())?;
    if request.html.is_empty() {
        return Err(invalid());
    }

    Ok(Html(render_page(&request.html)))
}

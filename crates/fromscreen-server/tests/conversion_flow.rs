//! End-to-end tests for the conversion API over in-memory stores.

mod common;

use axum::http::{header, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde_json::json;

use common::{
    app_with, body_text, get, json_body, post_conversion, post_json, session_cookie, sse_events,
    FakeClient, IMAGE,
};

#[tokio::test]
async fn test_conversion_streams_then_reads_back() {
    let client = FakeClient::streaming(&[
        "```html\n",
        "<div class=\"p-4\" onclick=\"x()\">",
        "<h1 class=\"text-xl\">Dashboard</h1>",
        "</div>\n```",
    ]);
    let app = app_with(client.clone());

    let response = post_conversion(&app, json!({ "image": IMAGE }), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    let cookie = session_cookie(&response).expect("new session should set a cookie");
    assert!(cookie.starts_with("session_id="));

    let events = sse_events(response).await;
    assert!(events.len() >= 3, "events: {:?}", events);

    // id first, chunks in order, exactly one terminal event last.
    assert_eq!(events[0]["type"], "id");
    let id = events[0]["id"].as_str().unwrap().to_string();
    let chunks: String = events[1..events.len() - 1]
        .iter()
        .map(|e| {
            assert_eq!(e["type"], "chunk");
            e["content"].as_str().unwrap()
        })
        .collect();
    assert!(chunks.starts_with("```html"));

    let done = events.last().unwrap();
    assert_eq!(done["type"], "done");
    assert_eq!(done["id"], id.as_str());
    let html = done["html"].as_str().unwrap();
    assert_eq!(
        html,
        "<div class=\"p-4\" onclick=\"x()\"><h1 class=\"text-xl\">Dashboard</h1></div>\n"
    );
    assert_eq!(
        html,
        fromscreen_server::format::canonicalize(&chunks).unwrap()
    );
    assert_eq!(client.calls(), 1);

    // Read-back returns the same markup.
    let response = get(&app, &format!("/api/v1/conversions/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["conversion"]["id"], id.as_str());
    assert_eq!(body["conversion"]["markup"], html);
    assert!(body["conversion"]["createdAt"].is_string());

    // History lists it.
    let body = json_body(get(&app, "/api/v1/conversions?limit=10", None).await).await;
    assert_eq!(body["conversions"].as_array().unwrap().len(), 1);
    assert_eq!(body["conversions"][0]["id"], id.as_str());

    // The preview is sanitized.
    let response = get(&app, &format!("/api/v1/preview/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("<h1 class=\"text-xl\">Dashboard</h1>"));
    assert!(!page.contains("onclick"));
}

#[tokio::test]
async fn test_sixth_request_is_denied_without_upstream_call() {
    let client = FakeClient::streaming(&["<p>ok</p>"]);
    let app = app_with(client.clone());

    let first = post_conversion(&app, json!({ "image": IMAGE }), None).await;
    let cookie = session_cookie(&first).unwrap();
    sse_events(first).await;

    for _ in 0..4 {
        let response = post_conversion(&app, json!({ "image": IMAGE }), Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).is_none());
        sse_events(response).await;
    }
    assert_eq!(client.calls(), 5);

    let response = post_conversion(&app, json!({ "image": IMAGE }), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 86_400);
    assert!(!body_text(response).await.contains("\"type\""));
    assert_eq!(client.calls(), 5);

    let usage = json_body(get(&app, "/api/v1/usage", Some(&cookie)).await).await;
    assert_eq!(
        usage,
        json!({ "count": 5, "limit": 5, "remaining": 0, "hasReachedLimit": true })
    );

    // Another session is unaffected.
    let other = post_conversion(&app, json!({ "image": IMAGE }), None).await;
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_images_are_rejected_before_quota() {
    let client = FakeClient::streaming(&["<p>ok</p>"]);
    let app = app_with(client.clone());
    let cookie = "session_id=550e8400-e29b-41d4-a716-446655440000";

    let bad_bodies = [
        json!({ "image": "data:text/plain;base64,AAAA" }),
        json!({ "image": "data:image/png;base64," }),
        json!({ "image": "data:image/png;base64,@@@@" }),
        json!({ "image": "https://example.com/shot.png" }),
        json!({ "picture": IMAGE }),
    ];
    for body in bad_bodies {
        let response = post_conversion(&app, body.clone(), Some(cookie)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }

    assert_eq!(client.calls(), 0);
    let usage = json_body(get(&app, "/api/v1/usage", Some(cookie)).await).await;
    assert_eq!(usage["count"], 0);
    assert_eq!(usage["remaining"], 5);
}

fn png_data_url(decoded_len: usize) -> String {
    format!(
        "data:image/png;base64,{}",
        BASE64_STANDARD.encode(vec![0x89u8; decoded_len])
    )
}

#[tokio::test]
async fn test_full_page_screenshot_is_accepted() {
    let client = FakeClient::streaming(&["<p>ok</p>"]);
    let app = app_with(client.clone());

    let image = png_data_url(3 * 1024 * 1024);
    let response = post_conversion(&app, json!({ "image": image }), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let events = sse_events(response).await;
    assert_eq!(events.last().unwrap()["type"], "done");
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_image_over_size_cap_is_rejected() {
    let client = FakeClient::streaming(&["<p>ok</p>"]);
    let app = app_with(client.clone());

    let image = png_data_url(11 * 1024 * 1024);
    let response = post_conversion(&app, json!({ "image": image }), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_upstream_failure_reports_generic_error() {
    let client = FakeClient::rejecting();
    let app = app_with(client.clone());

    let response = post_conversion(&app, json!({ "image": IMAGE }), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let events = sse_events(response).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "id");
    assert_eq!(
        events[1],
        json!({ "type": "error", "message": "Conversion failed" })
    );

    let id = events[0]["id"].as_str().unwrap();
    let response = get(&app, &format!("/api/v1/conversions/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unparseable_markup_is_not_persisted() {
    let client = FakeClient::streaming(&["<div><section>", "never closed"]);
    let app = app_with(client);

    let events = sse_events(post_conversion(&app, json!({ "image": IMAGE }), None).await).await;
    assert_eq!(events.last().unwrap()["type"], "error");
    assert!(!events.iter().any(|e| e["type"] == "done"));

    let body = json_body(get(&app, "/api/v1/conversions", None).await).await;
    assert!(body["conversions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_usage_for_new_session() {
    let app = app_with(FakeClient::streaming(&[]));

    let response = get(&app, "/api/v1/usage", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_some());
    assert_eq!(
        json_body(response).await,
        json!({ "count": 0, "limit": 5, "remaining": 5, "hasReachedLimit": false })
    );
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let app = app_with(FakeClient::streaming(&[]));
    let id = uuid::Uuid::new_v4();

    let response = get(&app, &format!("/api/v1/conversions/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, &format!("/api/v1/preview/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preview_of_posted_markup() {
    let app = app_with(FakeClient::streaming(&[]));

    let response = post_json(
        &app,
        "/api/v1/preview",
        json!({ "html": "<main class=\"p-8\"><script>alert(1)</script><h1 onclick=\"x()\">Hi</h1></main>" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let page = body_text(response).await;
    assert!(page.contains("https://cdn.tailwindcss.com"));
    assert!(page.contains("<main class=\"p-8\"><h1>Hi</h1></main>"));
    assert!(!page.contains("alert(1)"));

    for body in [json!({ "html": "" }), json!({}), json!({ "html": 7 })] {
        let response = post_json(&app, "/api/v1/preview", body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }
}

#[tokio::test]
async fn test_health() {
    let app = app_with(FakeClient::streaming(&[]));
    let response = get(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_sessions_are_isolated_under_concurrency() {
    let client = FakeClient::streaming(&["<p>ok</p>"]);
    let app = app_with(client.clone());
    let cookie = "session_id=6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    let mut handles = Vec::new();
    for _ in 0..12 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let response = post_conversion(&app, json!({ "image": IMAGE }), Some(cookie)).await;
            let status = response.status();
            if status == StatusCode::OK {
                sse_events(response).await;
            }
            status
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap() == StatusCode::OK {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 5);
    assert_eq!(client.calls(), 5);
}

mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use futures::StreamExt;
use serde_json::json;

use common::app::{spawn_test_app, spawn_with, test_config};
use common::http::{assert_json_error, post_json, pulse_frames, request, response_json};
use vitals_backend::config::{EngineEnvConfig, LimitsConfig};

#[tokio::test]
async fn it_sse_endpoint_is_reachable() {
    let app = spawn_test_app().await;

    let response = request(&app.app, Method::GET, "/api/realtime/events", None, &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(content_type.contains("text/event-stream"));
}

#[tokio::test]
async fn it_sse_streams_flush_events() {
    let app = spawn_test_app().await;

    let response = request(&app.app, Method::GET, "/api/realtime/events", None, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body().into_data_stream();

    post_json(
        &app.app,
        "/api/vitals/frames/batch",
        Some(json!({ "frames": pulse_frames(0, 200) })),
    )
    .await;
    let flushed = app.state.monitor().flush_now().await.unwrap();

    let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("event within timeout")
        .expect("stream item")
        .expect("chunk bytes");
    let text = String::from_utf8(chunk.to_vec()).unwrap();

    let field = |name: &str| {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .map(str::trim_start)
    };
    assert_eq!(field("event:"), Some("vitals_flush"), "{text}");
    let data_line = field("data:").expect("data line");
    let event: serde_json::Value = serde_json::from_str(data_line).unwrap();
    assert_eq!(event["sessionId"], flushed.session_id);
    assert_eq!(event["displayedRate"], flushed.report.displayed_rate.unwrap());
    assert!(event["stats"]["total"].as_u64().unwrap() > 0);
    assert!(event["flushedAt"].is_string());
}

#[tokio::test]
async fn it_sse_connections_are_capped() {
    let limits = LimitsConfig {
        max_sse_connections: 0,
        ..LimitsConfig::default()
    };
    let app = spawn_with(test_config(limits, EngineEnvConfig::default())).await;

    let response = request(&app.app, Method::GET, "/api/realtime/events", None, &[]).await;
    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_json_error(&body, "RATE_LIMITED");
}

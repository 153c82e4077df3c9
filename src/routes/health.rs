use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::routes::realtime;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let running = state.monitor().is_running();
    Json(serde_json::json!({
        "status": if running { "ok" } else { "degraded" },
        "uptimeSecs": state.uptime_secs(),
        "monitor": {
            "running": running,
            "intervalMs": state.monitor().config().aggregation.interval_ms,
        },
        "sseConnections": realtime::active_connections(),
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Ready only while the monitor task accepts commands.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.monitor().is_running() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

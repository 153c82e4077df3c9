use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use vital_signs_wasm::FrameInput;

use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::validation::{validate_batch, validate_frame};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_snapshot))
        .route("/frames", post(post_frame))
        .route("/frames/batch", post(post_frames_batch))
        .route("/reset", post(reset_session))
        .route("/config", get(get_config))
}

async fn post_frame(
    State(state): State<AppState>,
    JsonBody(frame): JsonBody<FrameInput>,
) -> Result<impl IntoResponse, AppError> {
    validate_frame(&frame).map_err(AppError::validation)?;

    let outcome = state.monitor().process_frames(vec![frame]).await?;
    let report = outcome
        .last
        .ok_or_else(|| AppError::internal("monitor returned no report for a single frame"))?;
    Ok(ok(report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrameBatchRequest {
    frames: Vec<FrameInput>,
}

async fn post_frames_batch(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<FrameBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_batch(&req.frames, state.config().limits.max_batch_frames)
        .map_err(|e| AppError::validation(&e))?;

    let outcome = state.monitor().process_frames(req.frames).await?;
    Ok(ok(outcome))
}

async fn get_snapshot(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.monitor().snapshot().await?;
    Ok(ok(snapshot))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetResponse {
    session_id: String,
}

async fn reset_session(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let session_id = state.monitor().reset().await?;
    Ok(ok(ResetResponse { session_id }))
}

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.monitor().config().clone())
}

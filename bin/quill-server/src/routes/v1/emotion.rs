//! Emotion classification route.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use quill_core::ModelKind;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::handlers::tools;
use crate::middleware::trace::trace_id;
use crate::schemas::v1::emotion::{EmotionRequest, EmotionResponse, EmotionScore};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(analyze),
    components(schemas(EmotionRequest, EmotionResponse, EmotionScore))
)]
pub struct EmotionApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/emotion", post(analyze))
}

/// Score a text against every emotion label (`POST /v1/emotion`).
#[utoipa::path(
    post,
    path = "/v1/emotion",
    tag = "v1::tools",
    request_body = EmotionRequest,
    responses(
        (status = 200, description = "Emotion scores, highest first", body = EmotionResponse),
        (status = 422, description = "Empty text or threshold out of range"),
        (status = 502, description = "Model could not be loaded or answered badly"),
        (status = 504, description = "Inference timed out"),
    )
)]
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<EmotionRequest>,
) -> Result<Json<EmotionResponse>, ServerError> {
    let report = tools::analyze_emotion(&state, &req.text, req.threshold, trace_id(&headers)).await?;
    Ok(Json(EmotionResponse::from_report(
        tools::model_id(&state, ModelKind::EmotionClassifier),
        report,
    )))
}

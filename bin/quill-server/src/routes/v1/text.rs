//! Text-to-text routes: grammar correction, summarization, paraphrasing.

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
use crate::schemas::v1::text::{TextRequest, TextResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(correct, summarize, paraphrase),
    components(schemas(TextRequest, TextResponse))
)]
pub struct TextApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/grammar", post(correct))
        .route("/summarize", post(summarize))
        .route("/paraphrase", post(paraphrase))
}

async fn run(
    state: &AppState,
    kind: ModelKind,
    headers: &HeaderMap,
    req: TextRequest,
) -> Result<Json<TextResponse>, ServerError> {
    let text = tools::transform_text(state, kind, &req.text, trace_id(headers)).await?;
    Ok(Json(TextResponse {
        model: tools::model_id(state, kind),
        text,
    }))
}

/// Correct spelling and grammar (`POST /v1/grammar`).
#[utoipa::path(
    post,
    path = "/v1/grammar",
    tag = "v1::tools",
    request_body = TextRequest,
    responses(
        (status = 200, description = "Corrected text", body = TextResponse),
        (status = 422, description = "Empty text"),
        (status = 502, description = "Upstream model error"),
        (status = 504, description = "Inference timed out"),
    )
)]
pub async fn correct(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TextRequest>,
) -> Result<Json<TextResponse>, ServerError> {
    run(&state, ModelKind::GrammarCorrector, &headers, req).await
}

/// Summarize a text of at least 30 characters (`POST /v1/summarize`).
#[utoipa::path(
    post,
    path = "/v1/summarize",
    tag = "v1::tools",
    request_body = TextRequest,
    responses(
        (status = 200, description = "Summary", body = TextResponse),
        (status = 422, description = "Empty or too short text"),
        (status = 502, description = "Upstream model error"),
        (status = 504, description = "Inference timed out"),
    )
)]
pub async fn summarize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TextRequest>,
) -> Result<Json<TextResponse>, ServerError> {
    run(&state, ModelKind::Summarizer, &headers, req).await
}

/// Paraphrase a text of at least 10 characters (`POST /v1/paraphrase`).
#[utoipa::path(
    post,
    path = "/v1/paraphrase",
    tag = "v1::tools",
    request_body = TextRequest,
    responses(
        (status = 200, description = "Paraphrased text", body = TextResponse),
        (status = 422, description = "Empty or too short text"),
        (status = 502, description = "Upstream model error"),
        (status = 504, description = "Inference timed out"),
    )
)]
pub async fn paraphrase(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TextRequest>,
) -> Result<Json<TextResponse>, ServerError> {
    run(&state, ModelKind::Paraphraser, &headers, req).await
}

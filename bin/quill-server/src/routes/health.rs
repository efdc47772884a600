//! Liveness probe with a summary of model and dispatch state.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use quill_core::ModelKind;
use quill_core::dispatch::ToolState;
use serde::Serialize;
use strum::IntoEnumIterator;
use utoipa::{OpenApi, ToSchema};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthResponse)))]
pub struct HealthApi;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"ok"` while the process can answer.
    pub status: &'static str,
    pub version: &'static str,
    /// Kinds whose model has been resolved, e.g. `["grammar.corrector"]`.
    pub models_loaded: Vec<String>,
    /// Kinds with a request in flight.
    pub dispatching: Vec<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Reads cached state only; never loads a model or waits on a dispatch.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let dispatcher = &state.dispatcher;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        models_loaded: dispatcher
            .registry()
            .loaded()
            .into_iter()
            .map(|k| k.to_string())
            .collect(),
        dispatching: ModelKind::iter()
            .filter(|k| dispatcher.state(*k) == ToolState::Dispatching)
            .map(|k| k.to_string())
            .collect(),
    })
}

//! Tool status and request cancellation.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use quill_core::ModelKind;
use strum::IntoEnumIterator;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::handlers::tools::model_id;
use crate::schemas::v1::tools::{CancelResponse, ToolStatus};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_tools, cancel_request),
    components(schemas(ToolStatus, CancelResponse))
)]
pub struct ToolsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/requests/{id}", delete(cancel_request))
}

pub fn tool_statuses(state: &AppState) -> Vec<ToolStatus> {
    let registry = state.dispatcher.registry();
    ModelKind::iter()
        .map(|kind| {
            let handle = registry.peek(kind);
            ToolStatus {
                kind: kind.to_string(),
                title: kind.title().to_owned(),
                model_id: model_id(state, kind),
                loaded: handle.is_some(),
                revision: handle.as_ref().and_then(|h| h.revision().map(str::to_owned)),
                loaded_at: handle.as_ref().map(|h| {
                    DateTime::<Utc>::from(h.loaded_at()).to_rfc3339_opts(SecondsFormat::Secs, true)
                }),
                state: state.dispatcher.state(kind).to_string(),
            }
        })
        .collect()
}

/// List every tool with its model and current state (`GET /v1/tools`).
#[utoipa::path(
    get,
    path = "/v1/tools",
    tag = "v1::tools",
    responses(
        (status = 200, description = "Tool list", body = [ToolStatus]),
    )
)]
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolStatus>> {
    Json(tool_statuses(&state))
}

/// Cancel an in-flight request by its `x-trace-id` (`DELETE /v1/requests/{id}`).
#[utoipa::path(
    delete,
    path = "/v1/requests/{id}",
    tag = "v1::tools",
    params(("id" = String, Path, description = "Trace id of the request to cancel")),
    responses(
        (status = 200, description = "Cancellation signalled", body = CancelResponse),
        (status = 404, description = "No such request in flight"),
    )
)]
pub async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ServerError> {
    if !state.dispatcher.cancel(&id) {
        return Err(ServerError::NotFound(format!("no request '{id}' in flight")));
    }
    info!(request_id = %id, "request cancelled by client");
    Ok(Json(CancelResponse {
        request_id: id,
        cancelled: true,
    }))
}

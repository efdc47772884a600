pub mod emotion;
pub mod images;
pub mod text;
pub mod tools;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(emotion::router())
        .merge(text::router())
        .merge(images::router())
        .merge(tools::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct V1Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = V1Api::openapi();
    spec.merge(emotion::EmotionApi::openapi());
    spec.merge(text::TextApi::openapi());
    spec.merge(images::ImagesApi::openapi());
    spec.merge(tools::ToolsApi::openapi());
    spec
}

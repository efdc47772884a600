//! Image generation route.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::handlers::tools;
use crate::middleware::trace::trace_id;
use crate::schemas::v1::images::{ImageData, ImageGenerationRequest, ImageGenerationResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(generate_images),
    components(schemas(ImageGenerationRequest, ImageGenerationResponse, ImageData))
)]
pub struct ImagesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/images/generations", post(generate_images))
}

/// Key from the body, falling back to `Authorization: Bearer`.
fn api_key<'a>(req: &'a ImageGenerationRequest, headers: &'a HeaderMap) -> &'a str {
    req.api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
        .unwrap_or("")
}

/// Generate one image from a prompt (`POST /v1/images/generations`).
#[utoipa::path(
    post,
    path = "/v1/images/generations",
    tag = "v1::tools",
    request_body = ImageGenerationRequest,
    responses(
        (status = 200, description = "Generated image", body = ImageGenerationResponse),
        (status = 422, description = "Missing API key, missing prompt or unknown size"),
        (status = 502, description = "Image service error (e.g. rejected key)"),
        (status = 504, description = "Generation timed out"),
    )
)]
pub async fn generate_images(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ImageGenerationRequest>,
) -> Result<Json<ImageGenerationResponse>, ServerError> {
    let image = tools::generate_image(
        &state,
        api_key(&req, &headers),
        &req.prompt,
        req.size.as_deref().unwrap_or(""),
        trace_id(&headers),
    )
    .await?;

    Ok(Json(ImageGenerationResponse {
        created: Utc::now().timestamp(),
        data: vec![ImageData {
            b64_json: image.to_base64(),
            format: image.format,
            width: image.width,
            height: image.height,
        }],
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    fn request(key: Option<&str>) -> ImageGenerationRequest {
        ImageGenerationRequest {
            prompt: "a fox".into(),
            size: None,
            api_key: key.map(str::to_owned),
        }
    }

    #[test]
    fn body_key_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer sk-header".parse().unwrap());
        assert_eq!(api_key(&request(Some("sk-body")), &headers), "sk-body");
        assert_eq!(api_key(&request(Some("  ")), &headers), "sk-header");
        assert_eq!(api_key(&request(None), &headers), "sk-header");
    }

    #[test]
    fn missing_key_is_empty() {
        assert_eq!(api_key(&request(None), &HeaderMap::new()), "");
    }
}

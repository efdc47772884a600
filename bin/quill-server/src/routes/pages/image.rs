use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::Html;
use minijinja::context;
use quill_core::{ImageSize, ModelKind};
use serde::Serialize;
use strum::IntoEnumIterator;

use super::{FormData, Outcome, render};
use crate::error::ServerError;
use crate::handlers::tools;
use crate::middleware::trace::trace_id;
use crate::state::AppState;

/// What the page needs to show a generated image.
#[derive(Serialize)]
struct ImageView {
    data_url: String,
    format: String,
    width: u32,
    height: u32,
}

fn page(
    state: &AppState,
    prompt: &str,
    size: &str,
    outcome: Outcome<ImageView>,
) -> Result<Html<String>, ServerError> {
    let sizes: Vec<String> = ImageSize::iter().map(|s| s.to_string()).collect();
    render(
        state,
        "image.html",
        context! {
            page => "image",
            model_id => tools::model_id(state, ModelKind::ImageGenerator),
            busy_label => "Generating image...",
            prompt => prompt,
            size => size,
            sizes => sizes,
            image => outcome.result,
            warning => outcome.warning,
            error => outcome.error,
        },
    )
}

pub async fn show(State(state): State<Arc<AppState>>) -> Result<Html<String>, ServerError> {
    page(&state, "", &ImageSize::default().to_string(), Outcome::none())
}

/// The API key is used for this one dispatch and never echoed back.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Html<String>, ServerError> {
    let form = FormData::read(multipart).await?;
    let prompt = form.text("prompt");
    let size = form.text("size");

    let outcome = tools::generate_image(&state, form.text("api_key"), prompt, size, trace_id(&headers))
        .await
        .map(|image| ImageView {
            data_url: image.data_url(),
            format: image.format,
            width: image.width,
            height: image.height,
        })
        .into();

    page(&state, prompt, size, outcome)
}

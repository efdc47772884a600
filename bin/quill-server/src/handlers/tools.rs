//! One function per tool action, shared by the JSON API and the pages.
//!
//! Each validates its input first; a validation failure returns before the
//! dispatcher is involved, so no external call is made.

use quill_core::dispatch::Job;
use quill_core::input::{self, validate_threshold};
use quill_core::render::{self, EmotionReport, RenderedImage};
use quill_core::{InferenceRequest, ModelKind};
use tracing::info;

use crate::error::ServerError;
use crate::state::AppState;

/// Model id currently configured for `kind`.
pub fn model_id(state: &AppState, kind: ModelKind) -> String {
    state.dispatcher.registry().spec(kind).model_id
}

async fn dispatch(
    state: &AppState,
    kind: ModelKind,
    request: InferenceRequest,
    request_id: Option<String>,
) -> Result<quill_core::InferenceOutput, ServerError> {
    let mut job = Job::new(kind, request);
    if let Some(id) = request_id {
        job = job.with_request_id(id);
    }
    Ok(state.dispatcher.run(job).await?)
}

pub async fn analyze_emotion(
    state: &AppState,
    text: &str,
    threshold: f64,
    request_id: Option<String>,
) -> Result<EmotionReport, ServerError> {
    let threshold = validate_threshold(threshold)?;
    let request = input::prepare_text(ModelKind::EmotionClassifier, text)?;

    let scores = dispatch(state, ModelKind::EmotionClassifier, request, request_id)
        .await?
        .into_scores()?;
    let report = render::render_emotion(scores, threshold)?;
    info!(top_label = %report.top_label, confident = report.confident, "emotion analyzed");
    Ok(report)
}

/// Run one of the text-to-text tools.
pub async fn transform_text(
    state: &AppState,
    kind: ModelKind,
    text: &str,
    request_id: Option<String>,
) -> Result<String, ServerError> {
    let request = input::prepare_text(kind, text)?;
    let generated = dispatch(state, kind, request, request_id)
        .await?
        .into_text()?;
    Ok(render::render_text(generated))
}

pub async fn generate_image(
    state: &AppState,
    api_key: &str,
    prompt: &str,
    size: &str,
    request_id: Option<String>,
) -> Result<RenderedImage, ServerError> {
    let request = input::prepare_image(api_key, prompt, size)?;
    let bytes = dispatch(state, ModelKind::ImageGenerator, request, request_id)
        .await?
        .into_image()?;
    let image = render::render_image(bytes)?;
    info!(format = %image.format, width = image.width, height = image.height, "image generated");
    Ok(image)
}

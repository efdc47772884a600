use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::http::HeaderMap;
use axum::response::Html;
use minijinja::context;
use quill_core::ModelKind;
use quill_core::input::EMOTION_EXAMPLES;
use quill_core::render::{DEFAULT_THRESHOLD, EmotionReport};
use serde::Deserialize;

use super::{FormData, Outcome, UPLOAD_NOTICE, collect_text, render};
use crate::error::ServerError;
use crate::handlers::tools;
use crate::middleware::trace::trace_id;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EmotionQuery {
    /// Index into the example sentences; pre-fills the text box.
    example: Option<usize>,
    show_examples: Option<String>,
    threshold: Option<f64>,
}

struct EmotionPage<'a> {
    text: &'a str,
    threshold: f64,
    show_examples: bool,
    notice: Option<&'static str>,
}

impl EmotionPage<'_> {
    fn render(self, state: &AppState, outcome: Outcome<EmotionReport>) -> Result<Html<String>, ServerError> {
        render(
            state,
            "emotion.html",
            context! {
                page => "emotion",
                model_id => tools::model_id(state, ModelKind::EmotionClassifier),
                busy_label => "Analyzing...",
                text => self.text,
                threshold => self.threshold,
                show_examples => self.show_examples,
                examples => EMOTION_EXAMPLES,
                notice => self.notice,
                report => outcome.result,
                warning => outcome.warning,
                error => outcome.error,
            },
        )
    }
}

fn parse_threshold(raw: &str) -> Result<f64, ServerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_THRESHOLD);
    }
    raw.parse()
        .map_err(|_| ServerError::BadRequest("Confidence threshold must be a number.".into()))
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EmotionQuery>,
) -> Result<Html<String>, ServerError> {
    let example = q.example.and_then(|i| EMOTION_EXAMPLES.get(i)).copied();
    EmotionPage {
        text: example.unwrap_or_default(),
        threshold: q.threshold.unwrap_or(DEFAULT_THRESHOLD),
        show_examples: q.show_examples.is_some() || example.is_some(),
        notice: None,
    }
    .render(&state, Outcome::none())
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Html<String>, ServerError> {
    let form = FormData::read(multipart).await?;
    let (text, input) = collect_text(&form);
    let threshold = parse_threshold(form.text("threshold"));
    let notice = matches!(&input, Ok(i) if i.from_upload).then_some(UPLOAD_NOTICE);

    let echoed_threshold = threshold.as_ref().copied().unwrap_or(DEFAULT_THRESHOLD);
    let outcome: Outcome<EmotionReport> = async {
        let input = input?;
        let threshold = threshold?;
        tools::analyze_emotion(&state, &input.text, threshold, trace_id(&headers)).await
    }
    .await
    .into();

    EmotionPage {
        text: &text,
        threshold: echoed_threshold,
        show_examples: form.get("show_examples").is_some(),
        notice,
    }
    .render(&state, outcome)
}

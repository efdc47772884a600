//! Server-rendered tool pages.
//!
//! Every tool page is a `GET` that renders an empty form and a multipart
//! `POST` that renders the same form again with the previous input echoed
//! back plus a result, a warning (input rejected, nothing dispatched) or an
//! error (the external call failed).

mod assistant;
mod emotion;
mod grammar;
mod image;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::Html;
use axum::Router;
use axum::routing::get;
use minijinja::{Value, context};
use quill_core::{ModelKind, ValidationError};
use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::debug;

use crate::error::ServerError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/emotion", get(emotion::show).post(emotion::submit))
        .route("/grammar", get(grammar::show).post(grammar::submit))
        .route("/assistant", get(assistant::show).post(assistant::submit))
        .route("/image", get(image::show).post(image::submit))
}

/// Fields of a submitted tool form.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    /// Bytes of the `file` field, when a file was actually chosen.
    upload: Option<Vec<u8>>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            if name == "file" {
                let has_name = field.file_name().is_some_and(|n| !n.is_empty());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read upload: {e}")))?;
                // Browsers send an empty part when no file was chosen.
                if has_name || !bytes.is_empty() {
                    debug!(size_bytes = bytes.len(), "received file upload");
                    form.upload = Some(bytes.to_vec());
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field {name}: {e}")))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn text(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    pub fn upload(&self) -> Option<&[u8]> {
        self.upload.as_deref()
    }
}

/// What a form submission produced, split into the page's message slots.
pub struct Outcome<T> {
    pub result: Option<T>,
    pub warning: Option<String>,
    pub error: Option<String>,
}

impl<T> Outcome<T> {
    /// Nothing submitted yet.
    pub fn none() -> Self {
        Self {
            result: None,
            warning: None,
            error: None,
        }
    }
}

impl<T> From<Result<T, ServerError>> for Outcome<T> {
    fn from(r: Result<T, ServerError>) -> Self {
        match r {
            Ok(v) => Self {
                result: Some(v),
                warning: None,
                error: None,
            },
            Err(e) => {
                e.log();
                match &e {
                    // An unreadable upload is shown as an error, not a nudge.
                    ServerError::Validation(ValidationError::UnreadableUpload) => Self {
                        result: None,
                        warning: None,
                        error: Some(e.client_message()),
                    },
                    ServerError::Validation(_) => Self {
                        result: None,
                        warning: Some(e.client_message()),
                        error: None,
                    },
                    _ => Self {
                        result: None,
                        warning: None,
                        error: Some(e.client_message()),
                    },
                }
            }
        }
    }
}

pub fn render(state: &AppState, name: &str, ctx: Value) -> Result<Html<String>, ServerError> {
    let html = state.templates.get_template(name)?.render(ctx)?;
    Ok(Html(html))
}

const UPLOAD_NOTICE: &str = "Loaded text from file.";

/// Text for a tool: the decoded upload if one was sent, else the typed text.
///
/// Returns the text to echo back into the form alongside the outcome, so a
/// rejected upload leaves the typed text in place.
pub fn collect_text(form: &FormData) -> (String, Result<quill_core::input::TextInput, ServerError>) {
    match quill_core::input::TextInput::collect(Some(form.text("text")), form.upload()) {
        Ok(input) => (input.text.clone(), Ok(input)),
        Err(e) => (form.text("text").to_owned(), Err(e.into())),
    }
}

#[derive(Serialize)]
struct ToolLink {
    title: &'static str,
    href: &'static str,
    model_id: String,
    loaded: bool,
}

async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ServerError> {
    let registry = state.dispatcher.registry();
    let tools: Vec<ToolLink> = ModelKind::iter()
        .map(|kind| ToolLink {
            title: kind.title(),
            href: match kind {
                ModelKind::EmotionClassifier => "/emotion",
                ModelKind::GrammarCorrector => "/grammar",
                ModelKind::Summarizer | ModelKind::Paraphraser => "/assistant",
                ModelKind::ImageGenerator => "/image",
            },
            model_id: registry.spec(kind).model_id,
            loaded: registry.is_loaded(kind),
        })
        .collect();
    render(&state, "index.html", context! { page => "index", tools => tools })
}

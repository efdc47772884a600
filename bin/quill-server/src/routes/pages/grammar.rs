use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::Html;
use minijinja::context;
use quill_core::ModelKind;

use super::{FormData, Outcome, UPLOAD_NOTICE, collect_text, render};
use crate::error::ServerError;
use crate::handlers::tools;
use crate::middleware::trace::trace_id;
use crate::state::AppState;

fn page(
    state: &AppState,
    text: &str,
    notice: Option<&str>,
    outcome: Outcome<String>,
) -> Result<Html<String>, ServerError> {
    render(
        state,
        "grammar.html",
        context! {
            page => "grammar",
            model_id => tools::model_id(state, ModelKind::GrammarCorrector),
            busy_label => "Correcting...",
            text => text,
            notice => notice,
            result => outcome.result,
            warning => outcome.warning,
            error => outcome.error,
        },
    )
}

pub async fn show(State(state): State<Arc<AppState>>) -> Result<Html<String>, ServerError> {
    page(&state, "", None, Outcome::none())
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Html<String>, ServerError> {
    let form = FormData::read(multipart).await?;
    let (text, input) = collect_text(&form);
    let notice = matches!(&input, Ok(i) if i.from_upload).then_some(UPLOAD_NOTICE);

    let outcome = async {
        let input = input?;
        tools::transform_text(&state, ModelKind::GrammarCorrector, &input.text, trace_id(&headers)).await
    }
    .await
    .into();

    page(&state, &text, notice, outcome)
}

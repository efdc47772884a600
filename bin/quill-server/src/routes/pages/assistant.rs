//! Combined writing assistant: one page, three text tools.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::Html;
use minijinja::context;
use quill_core::{ModelKind, ValidationError};
use serde::Serialize;

use super::{FormData, Outcome, UPLOAD_NOTICE, collect_text, render};
use crate::error::ServerError;
use crate::handlers::tools;
use crate::middleware::trace::trace_id;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize)]
struct Tool {
    value: &'static str,
    label: &'static str,
    button: &'static str,
    busy: &'static str,
    heading: &'static str,
    #[serde(skip)]
    kind: ModelKind,
}

const TOOLS: [Tool; 3] = [
    Tool {
        value: "summarize",
        label: "Text Summarizer",
        button: "Summarize",
        busy: "Summarizing...",
        heading: "Summary",
        kind: ModelKind::Summarizer,
    },
    Tool {
        value: "paraphrase",
        label: "Text Paraphraser",
        button: "Paraphrase",
        busy: "Paraphrasing...",
        heading: "Paraphrased Text",
        kind: ModelKind::Paraphraser,
    },
    Tool {
        value: "correct",
        label: "Grammar Corrector",
        button: "Correct",
        busy: "Correcting...",
        heading: "Corrected Text",
        kind: ModelKind::GrammarCorrector,
    },
];

fn find_tool(value: &str) -> Result<Tool, ValidationError> {
    TOOLS
        .iter()
        .find(|t| t.value == value)
        .copied()
        .ok_or_else(|| ValidationError::UnknownTool(value.to_owned()))
}

fn page(
    state: &AppState,
    tool: Tool,
    text: &str,
    notice: Option<&str>,
    outcome: Outcome<String>,
) -> Result<Html<String>, ServerError> {
    render(
        state,
        "assistant.html",
        context! {
            page => "assistant",
            model_id => tools::model_id(state, tool.kind),
            busy_label => tool.busy,
            tools => TOOLS,
            selected => tool.value,
            button => tool.button,
            result_heading => tool.heading,
            text => text,
            notice => notice,
            result => outcome.result,
            warning => outcome.warning,
            error => outcome.error,
        },
    )
}

pub async fn show(State(state): State<Arc<AppState>>) -> Result<Html<String>, ServerError> {
    page(&state, TOOLS[0], "", None, Outcome::none())
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Html<String>, ServerError> {
    let form = FormData::read(multipart).await?;
    let (text, input) = collect_text(&form);
    let notice = matches!(&input, Ok(i) if i.from_upload).then_some(UPLOAD_NOTICE);

    let tool = find_tool(form.get("tool").unwrap_or(TOOLS[0].value));
    let shown = tool.as_ref().copied().unwrap_or(TOOLS[0]);

    let outcome = async {
        let tool = tool?;
        let input = input?;
        tools::transform_text(&state, tool.kind, &input.text, trace_id(&headers)).await
    }
    .await
    .into();

    page(&state, shown, &text, notice, outcome)
}

use quill_core::render::{DEFAULT_THRESHOLD, EmotionReport};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /v1/emotion`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EmotionRequest {
    /// Text to classify.
    pub text: String,
    /// Minimum top score for a confident prediction, in `[0, 1]`
    /// (default `0.35`).
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmotionScore {
    pub label: String,
    pub score: f64,
}

/// Response body for `POST /v1/emotion`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmotionResponse {
    pub model: String,
    pub top_label: String,
    pub glyph: String,
    pub top_score: f64,
    /// Top score as a percentage, e.g. `"90.00%"`.
    pub confidence: String,
    pub confident: bool,
    pub threshold: f64,
    /// Every label, highest score first.
    pub scores: Vec<EmotionScore>,
}

impl EmotionResponse {
    pub fn from_report(model: String, report: EmotionReport) -> Self {
        Self {
            model,
            glyph: report.glyph.to_owned(),
            confidence: report.confidence_text,
            confident: report.confident,
            threshold: report.threshold,
            top_score: report.top_score,
            top_label: report.top_label,
            scores: report
                .rows
                .into_iter()
                .map(|r| EmotionScore {
                    label: r.label,
                    score: r.score,
                })
                .collect(),
        }
    }
}

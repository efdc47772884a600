use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for the text-to-text tools
/// (`/v1/grammar`, `/v1/summarize`, `/v1/paraphrase`).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TextResponse {
    /// Hosted model that produced the text.
    pub model: String,
    /// Generated text, exactly as returned by the model.
    pub text: String,
}

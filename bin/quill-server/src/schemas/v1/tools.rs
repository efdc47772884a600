use serde::Serialize;
use utoipa::ToSchema;

/// One entry of `GET /v1/tools`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolStatus {
    /// Model kind, e.g. `"grammar.corrector"`.
    pub kind: String,
    pub title: String,
    /// Hosted model backing the kind.
    pub model_id: String,
    /// Whether the model handle has been constructed.
    pub loaded: bool,
    /// Hub commit the model resolved to, when verified on load.
    pub revision: Option<String>,
    /// RFC 3339 time the model was loaded.
    pub loaded_at: Option<String>,
    /// `"idle"` or `"dispatching"`.
    pub state: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CancelResponse {
    pub request_id: String,
    pub cancelled: bool,
}

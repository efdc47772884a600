use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /v1/images/generations`.
///
/// Exactly one image is generated per request.
#[derive(Clone, Deserialize, ToSchema)]
pub struct ImageGenerationRequest {
    /// Text description of the desired image.
    pub prompt: String,
    /// `"256x256"`, `"512x512"`, `"1024x1024"` or `"auto"` (default `"256x256"`).
    #[serde(default)]
    pub size: Option<String>,
    /// Image API key. May instead be sent as `Authorization: Bearer <key>`.
    #[serde(default)]
    pub api_key: Option<String>,
}

// The API key must never reach a log line.
impl std::fmt::Debug for ImageGenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerationRequest")
            .field("prompt", &self.prompt)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImageData {
    pub b64_json: String,
    /// Lower-case format name, e.g. `"png"`.
    pub format: String,
    pub width: u32,
    pub height: u32,
}

/// Response body for `POST /v1/images/generations`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImageGenerationResponse {
    /// Unix timestamp (seconds).
    pub created: i64,
    pub data: Vec<ImageData>,
}

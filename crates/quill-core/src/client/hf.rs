//! Hugging Face hosted inference.
//!
//! Requests are `POST <endpoint>/models/<model_id>` with a JSON body of
//! `{"inputs": ..., "parameters": {...}}`.
//!
//! ### Response schemas
//! | Pipeline                         | Body                                   |
//! |----------------------------------|----------------------------------------|
//! | text classification (all scores) | `[[{"label": "joy", "score": 0.9}, …]]` |
//! | text classification (flattened)  | `[{"label": "joy", "score": 0.9}, …]`   |
//! | text2text generation             | `[{"generated_text": "…"}]`             |
//! | summarization                    | `[{"summary_text": "…"}]`               |

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{InferenceClient, upstream_error};
use crate::error::CoreError;
use crate::types::{
    Capability, GenerationParams, InferenceOutput, InferenceRequest, LabelScore, ModelHandle,
    ModelSpec,
};

pub const DEFAULT_ENDPOINT: &str = "https://router.huggingface.co/hf-inference";

/// Asks the classifier for every label rather than only the best one.
const ALL_LABELS_TOP_K: u32 = 64;

/// Settings for [`HfInferenceClient`].
#[derive(Debug, Clone)]
pub struct HfConfig {
    /// Base URL of the inference service.
    pub endpoint: String,
    /// Access token sent as a bearer credential, when set.
    pub token: Option<String>,
    /// When `true`, `load` resolves the model's repository on the hub and
    /// fails for unknown model ids instead of deferring that to the first
    /// request.
    pub verify_models: bool,
}

impl Default for HfConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            token: None,
            verify_models: true,
        }
    }
}

pub struct HfInferenceClient {
    http: reqwest::Client,
    config: HfConfig,
}

impl HfInferenceClient {
    pub fn new(config: HfConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: HfConfig) -> Self {
        Self { http, config }
    }

    fn model_url(&self, model_id: &str) -> String {
        format!(
            "{}/models/{}",
            self.config.endpoint.trim_end_matches('/'),
            model_id
        )
    }

    async fn post(&self, model_id: &str, body: serde_json::Value) -> Result<bytes::Bytes, CoreError> {
        let mut req = self.http.post(self.model_url(model_id)).json(&body);
        if let Some(token) = &self.config.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(upstream_error(resp).await);
        }
        Ok(resp.bytes().await?)
    }

    /// Fetch repository metadata from the hub and return the commit sha.
    async fn resolve_revision(&self, model_id: &str) -> Result<String, CoreError> {
        let repo_id = model_id.to_owned();
        let token = self.config.token.clone();
        tokio::task::spawn_blocking(move || {
            use hf_hub::api::sync::ApiBuilder;
            let api = ApiBuilder::new()
                .with_token(token)
                .with_progress(false)
                .build()
                .map_err(|e| format!("hf-hub init failed: {e}"))?;
            let info = api
                .model(repo_id)
                .info()
                .map_err(|e| format!("hf-hub info failed: {e}"))?;
            Ok::<String, String>(info.sha)
        })
        .await
        .map_err(|e| CoreError::ModelLoad {
            model_id: model_id.to_owned(),
            message: format!("hub lookup task panicked: {e}"),
        })?
        .map_err(|message| CoreError::ModelLoad {
            model_id: model_id.to_owned(),
            message,
        })
    }
}

#[async_trait]
impl InferenceClient for HfInferenceClient {
    async fn load(&self, spec: &ModelSpec) -> Result<ModelHandle, CoreError> {
        let revision = if self.config.verify_models {
            let sha = self.resolve_revision(&spec.model_id).await?;
            info!(model_id = %spec.model_id, revision = %sha, "model resolved on hub");
            Some(sha)
        } else {
            None
        };
        Ok(ModelHandle::new(spec.clone(), revision))
    }

    async fn infer(
        &self,
        handle: &ModelHandle,
        request: InferenceRequest,
    ) -> Result<InferenceOutput, CoreError> {
        debug!(model_id = %handle.model_id(), ?request, "hf inference request");
        match request {
            InferenceRequest::Classify { text } => {
                let body = self
                    .post(
                        handle.model_id(),
                        json!({ "inputs": text, "parameters": { "top_k": ALL_LABELS_TOP_K } }),
                    )
                    .await?;
                parse_classification(&body).map(InferenceOutput::Scores)
            }
            InferenceRequest::GenerateText { text, params } => {
                let body = self
                    .post(handle.model_id(), generation_body(&text, &params))
                    .await?;
                parse_generated_text(&body).map(InferenceOutput::Text)
            }
            InferenceRequest::GenerateImage { .. } => Err(CoreError::Unsupported {
                capability: Capability::GenerateImage,
                model_id: handle.model_id().to_owned(),
            }),
        }
    }
}

fn generation_body(text: &str, params: &GenerationParams) -> serde_json::Value {
    json!({ "inputs": text, "parameters": params })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Deserialize)]
struct GeneratedText {
    #[serde(alias = "summary_text")]
    generated_text: String,
}

pub(crate) fn parse_classification(body: &[u8]) -> Result<Vec<LabelScore>, CoreError> {
    let parsed: ClassificationResponse = serde_json::from_slice(body)
        .map_err(|e| CoreError::MalformedResponse(format!("classification: {e}")))?;
    let scores = match parsed {
        ClassificationResponse::Nested(mut outer) => {
            if outer.is_empty() {
                Vec::new()
            } else {
                outer.swap_remove(0)
            }
        }
        ClassificationResponse::Flat(scores) => scores,
    };
    if scores.is_empty() {
        return Err(CoreError::MalformedResponse(
            "classification returned no labels".into(),
        ));
    }
    Ok(scores)
}

pub(crate) fn parse_generated_text(body: &[u8]) -> Result<String, CoreError> {
    let parsed: Vec<GeneratedText> = serde_json::from_slice(body)
        .map_err(|e| CoreError::MalformedResponse(format!("text generation: {e}")))?;
    parsed
        .into_iter()
        .next()
        .map(|g| g.generated_text)
        .ok_or_else(|| CoreError::MalformedResponse("text generation returned no output".into()))
}

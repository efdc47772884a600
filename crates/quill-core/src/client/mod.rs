//! Inference clients.
//!
//! [`InferenceClient`] is the seam between the tools and whatever actually
//! runs the models. Two HTTP implementations ship with the crate:
//!
//! | Client                 | Capabilities              | Service                    |
//! |------------------------|---------------------------|----------------------------|
//! | [`HfInferenceClient`]  | `Classify`, `GenerateText`| Hugging Face inference API |
//! | [`OpenAiImageClient`]  | `GenerateImage`           | OpenAI images API          |
//!
//! [`RoutingClient`] puts them behind a single handle by routing on the
//! model kind's capability.

pub mod hf;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{Capability, InferenceOutput, InferenceRequest, ModelHandle, ModelSpec};

pub use hf::{HfConfig, HfInferenceClient};
pub use openai::{OpenAiImageClient, OpenAiImageConfig};

/// Loads model handles and runs requests against them.
///
/// Neither method retries; failures surface to the caller on the first
/// attempt.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Construct a handle for `spec`. Called at most once per kind by
    /// [`ModelRegistry`](crate::registry::ModelRegistry).
    async fn load(&self, spec: &ModelSpec) -> Result<ModelHandle, CoreError>;

    /// Run a single request against a previously loaded handle.
    async fn infer(
        &self,
        handle: &ModelHandle,
        request: InferenceRequest,
    ) -> Result<InferenceOutput, CoreError>;
}

/// Routes text kinds to one client and the image kind to another.
pub struct RoutingClient {
    text: Arc<dyn InferenceClient>,
    image: Arc<dyn InferenceClient>,
}

impl RoutingClient {
    pub fn new(text: Arc<dyn InferenceClient>, image: Arc<dyn InferenceClient>) -> Self {
        Self { text, image }
    }

    fn route(&self, capability: Capability) -> &Arc<dyn InferenceClient> {
        match capability {
            Capability::Classify | Capability::GenerateText => &self.text,
            Capability::GenerateImage => &self.image,
        }
    }
}

#[async_trait]
impl InferenceClient for RoutingClient {
    async fn load(&self, spec: &ModelSpec) -> Result<ModelHandle, CoreError> {
        self.route(spec.kind.capability()).load(spec).await
    }

    async fn infer(
        &self,
        handle: &ModelHandle,
        request: InferenceRequest,
    ) -> Result<InferenceOutput, CoreError> {
        let capability = handle.kind().capability();
        if request.capability() != capability {
            return Err(CoreError::Unsupported {
                capability: request.capability(),
                model_id: handle.model_id().to_owned(),
            });
        }
        self.route(capability).infer(handle, request).await
    }
}

/// Turns a non-success HTTP response into [`CoreError::Upstream`], pulling
/// the human-readable message out of the usual JSON error envelopes:
/// `{"error": "..."}` and `{"error": {"message": "..."}}`.
pub(crate) async fn upstream_error(resp: reqwest::Response) -> CoreError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    CoreError::Upstream {
        status,
        message: extract_error_message(&body),
    }
}

pub(crate) fn extract_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        let err = v.get("error")?;
        err.as_str()
            .map(str::to_owned)
            .or_else(|| err.get("message")?.as_str().map(str::to_owned))
    });
    match message {
        Some(m) => m,
        None if body.trim().is_empty() => "empty response body".to_owned(),
        None => body.chars().take(200).collect(),
    }
}

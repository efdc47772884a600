//! OpenAI image generation.
//!
//! `POST <base_url>/images/generations` with
//! `{"model": ..., "prompt": ..., "size": ..., "n": 1}` and the caller's API
//! key as bearer credential. The reply is `{"data": [{"b64_json": ...}]}` or
//! `{"data": [{"url": ...}]}`; a URL is fetched before returning.

use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{InferenceClient, upstream_error};
use crate::error::CoreError;
use crate::types::{InferenceOutput, InferenceRequest, ModelHandle, ModelSpec};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiImageConfig {
    pub base_url: String,
}

impl Default for OpenAiImageConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}

pub struct OpenAiImageClient {
    http: reqwest::Client,
    config: OpenAiImageConfig,
}

impl OpenAiImageClient {
    pub fn new(config: OpenAiImageConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: OpenAiImageConfig) -> Self {
        Self { http, config }
    }

    async fn fetch_url(&self, url: &str) -> Result<Bytes, CoreError> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(upstream_error(resp).await);
        }
        Ok(resp.bytes().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Where the generated image lives in a successful response.
#[derive(Debug, PartialEq)]
enum ImageSource {
    Inline(Bytes),
    Remote(String),
}

fn parse_images_response(body: &[u8]) -> Result<ImageSource, CoreError> {
    let parsed: ImagesResponse = serde_json::from_slice(body)
        .map_err(|e| CoreError::MalformedResponse(format!("image generation: {e}")))?;
    let first = parsed.data.into_iter().next().ok_or_else(|| {
        CoreError::MalformedResponse("image generation returned no images".into())
    })?;
    match (first.b64_json, first.url) {
        (Some(b64), _) => base64::engine::general_purpose::STANDARD
            .decode(b64.as_bytes())
            .map(|v| ImageSource::Inline(Bytes::from(v)))
            .map_err(|e| CoreError::MalformedResponse(format!("invalid base64 image: {e}"))),
        (None, Some(url)) => Ok(ImageSource::Remote(url)),
        (None, None) => Err(CoreError::MalformedResponse(
            "image entry has neither b64_json nor url".into(),
        )),
    }
}

#[async_trait]
impl InferenceClient for OpenAiImageClient {
    /// Image models are addressed by name on every request; there is nothing
    /// to resolve up front.
    async fn load(&self, spec: &ModelSpec) -> Result<ModelHandle, CoreError> {
        Ok(ModelHandle::new(spec.clone(), None))
    }

    async fn infer(
        &self,
        handle: &ModelHandle,
        request: InferenceRequest,
    ) -> Result<InferenceOutput, CoreError> {
        let (prompt, size, api_key) = match request {
            InferenceRequest::GenerateImage {
                prompt,
                size,
                api_key,
            } => (prompt, size, api_key),
            other => {
                return Err(CoreError::Unsupported {
                    capability: other.capability(),
                    model_id: handle.model_id().to_owned(),
                });
            }
        };

        debug!(model = %handle.model_id(), %size, "image generation request");
        let url = format!(
            "{}/images/generations",
            self.config.base_url.trim_end_matches('/')
        );
        let resp = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(&json!({
                "model":  handle.model_id(),
                "prompt": prompt,
                "size":   size.to_string(),
                "n":      1,
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(upstream_error(resp).await);
        }
        let body = resp.bytes().await?;

        let image = match parse_images_response(&body)? {
            ImageSource::Inline(bytes) => bytes,
            ImageSource::Remote(url) => self.fetch_url(&url).await?,
        };
        info!(image_bytes = image.len(), "image generation done");
        Ok(InferenceOutput::Image(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelKind;

    #[test]
    fn inline_base64_is_decoded() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(b"\x89PNG");
        let body = format!(r#"{{"created":1,"data":[{{"b64_json":"{b64}"}}]}}"#);
        assert_eq!(
            parse_images_response(body.as_bytes()).unwrap(),
            ImageSource::Inline(Bytes::from_static(b"\x89PNG"))
        );
    }

    #[test]
    fn url_entries_are_returned_for_fetching() {
        let body = br#"{"data":[{"url":"https://example.com/a.png"}]}"#;
        assert_eq!(
            parse_images_response(body).unwrap(),
            ImageSource::Remote("https://example.com/a.png".into())
        );
    }

    #[test]
    fn unexpected_shapes_are_typed_errors() {
        for body in [
            r#"{"data":[]}"#,
            r#"{"data":[{}]}"#,
            r#"{"images":[]}"#,
            r#"{"data":[{"b64_json":"***"}]}"#,
        ] {
            assert!(
                matches!(
                    parse_images_response(body.as_bytes()),
                    Err(CoreError::MalformedResponse(_))
                ),
                "body {body} should be malformed"
            );
        }
    }

    #[tokio::test]
    async fn text_requests_are_unsupported() {
        let client = OpenAiImageClient::new(OpenAiImageConfig::default());
        let handle = client
            .load(&ModelSpec::default_for(ModelKind::ImageGenerator))
            .await
            .unwrap();
        let err = client
            .infer(&handle, InferenceRequest::Classify { text: "hi".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { .. }));
    }
}

use std::time::SystemTime;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::CoreError;

/// Fixed identifiers for the pipelines the tools are built on.
///
/// A kind names *what* is loaded; the concrete hosted model is described by
/// a [`ModelSpec`] and defaults to [`ModelKind::default_model_id`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum ModelKind {
    #[strum(serialize = "emotion.classifier")]
    #[serde(rename = "emotion.classifier")]
    EmotionClassifier,
    #[strum(serialize = "grammar.corrector")]
    #[serde(rename = "grammar.corrector")]
    GrammarCorrector,
    #[strum(serialize = "text.summarizer")]
    #[serde(rename = "text.summarizer")]
    Summarizer,
    #[strum(serialize = "text.paraphraser")]
    #[serde(rename = "text.paraphraser")]
    Paraphraser,
    #[strum(serialize = "image.generator")]
    #[serde(rename = "image.generator")]
    ImageGenerator,
}

impl ModelKind {
    pub fn default_model_id(self) -> &'static str {
        match self {
            ModelKind::EmotionClassifier => "j-hartmann/emotion-english-distilroberta-base",
            ModelKind::GrammarCorrector => "oliverguhr/spelling-correction-english-base",
            ModelKind::Summarizer => "sshleifer/distilbart-cnn-12-6",
            ModelKind::Paraphraser => "Vamsi/T5_Paraphrase_Paws",
            ModelKind::ImageGenerator => "gpt-image-1",
        }
    }

    pub fn capability(self) -> Capability {
        match self {
            ModelKind::EmotionClassifier => Capability::Classify,
            ModelKind::GrammarCorrector | ModelKind::Summarizer | ModelKind::Paraphraser => {
                Capability::GenerateText
            }
            ModelKind::ImageGenerator => Capability::GenerateImage,
        }
    }

    /// Human-readable tool name.
    pub fn title(self) -> &'static str {
        match self {
            ModelKind::EmotionClassifier => "Emotion Detector",
            ModelKind::GrammarCorrector => "Grammar Corrector",
            ModelKind::Summarizer => "Text Summarizer",
            ModelKind::Paraphraser => "Text Paraphraser",
            ModelKind::ImageGenerator => "Image Generator",
        }
    }

    /// Decoding limits for the text-to-text kinds.
    pub fn generation_params(self) -> Option<GenerationParams> {
        match self {
            ModelKind::GrammarCorrector => Some(GenerationParams {
                min_length: None,
                max_length: 200,
                do_sample: None,
            }),
            ModelKind::Summarizer => Some(GenerationParams {
                min_length: Some(30),
                max_length: 80,
                do_sample: Some(false),
            }),
            ModelKind::Paraphraser => Some(GenerationParams {
                min_length: None,
                max_length: 60,
                do_sample: None,
            }),
            ModelKind::EmotionClassifier | ModelKind::ImageGenerator => None,
        }
    }
}

/// What an inference client is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum Capability {
    Classify,
    GenerateText,
    GenerateImage,
}

/// Output sizes accepted by the image tool.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum ImageSize {
    #[default]
    #[strum(serialize = "256x256")]
    #[serde(rename = "256x256")]
    Square256,
    #[strum(serialize = "512x512")]
    #[serde(rename = "512x512")]
    Square512,
    #[strum(serialize = "1024x1024")]
    #[serde(rename = "1024x1024")]
    Square1024,
    #[strum(serialize = "auto")]
    #[serde(rename = "auto")]
    Auto,
}

/// One `label → score` pair from a classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Length bounds and decoding mode for text-to-text generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    pub max_length: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_sample: Option<bool>,
}

/// A single request against a loaded model.
#[derive(Clone)]
pub enum InferenceRequest {
    Classify {
        text: String,
    },
    GenerateText {
        text: String,
        params: GenerationParams,
    },
    /// Always asks for exactly one image.
    GenerateImage {
        prompt: String,
        size: ImageSize,
        api_key: String,
    },
}

impl InferenceRequest {
    pub fn capability(&self) -> Capability {
        match self {
            InferenceRequest::Classify { .. } => Capability::Classify,
            InferenceRequest::GenerateText { .. } => Capability::GenerateText,
            InferenceRequest::GenerateImage { .. } => Capability::GenerateImage,
        }
    }
}

// Hand-written so the image API key never reaches a log line.
impl std::fmt::Debug for InferenceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceRequest::Classify { text } => f
                .debug_struct("Classify")
                .field("text_chars", &text.chars().count())
                .finish(),
            InferenceRequest::GenerateText { text, params } => f
                .debug_struct("GenerateText")
                .field("text_chars", &text.chars().count())
                .field("params", params)
                .finish(),
            InferenceRequest::GenerateImage { prompt, size, .. } => f
                .debug_struct("GenerateImage")
                .field("prompt", prompt)
                .field("size", size)
                .field("api_key", &"<redacted>")
                .finish(),
        }
    }
}

/// Raw result of one dispatch, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutput {
    Scores(Vec<LabelScore>),
    Text(String),
    Image(Bytes),
}

impl InferenceOutput {
    pub fn into_scores(self) -> Result<Vec<LabelScore>, CoreError> {
        match self {
            InferenceOutput::Scores(s) => Ok(s),
            other => Err(CoreError::MalformedResponse(format!(
                "expected label scores, got {}",
                other.variant_name()
            ))),
        }
    }

    pub fn into_text(self) -> Result<String, CoreError> {
        match self {
            InferenceOutput::Text(t) => Ok(t),
            other => Err(CoreError::MalformedResponse(format!(
                "expected generated text, got {}",
                other.variant_name()
            ))),
        }
    }

    pub fn into_image(self) -> Result<Bytes, CoreError> {
        match self {
            InferenceOutput::Image(b) => Ok(b),
            other => Err(CoreError::MalformedResponse(format!(
                "expected image bytes, got {}",
                other.variant_name()
            ))),
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            InferenceOutput::Scores(_) => "label scores",
            InferenceOutput::Text(_) => "generated text",
            InferenceOutput::Image(_) => "image bytes",
        }
    }
}

/// Which hosted model backs a [`ModelKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub model_id: String,
}

impl ModelSpec {
    pub fn new(kind: ModelKind, model_id: impl Into<String>) -> Self {
        Self {
            kind,
            model_id: model_id.into(),
        }
    }

    pub fn default_for(kind: ModelKind) -> Self {
        Self::new(kind, kind.default_model_id())
    }
}

/// A loaded model: what was resolved at load time.
///
/// Handles are created once per kind by the registry and shared behind an
/// `Arc` for the rest of the process lifetime; they are never mutated.
#[derive(Debug)]
pub struct ModelHandle {
    spec: ModelSpec,
    revision: Option<String>,
    loaded_at: SystemTime,
}

impl ModelHandle {
    pub fn new(spec: ModelSpec, revision: Option<String>) -> Self {
        Self {
            spec,
            revision,
            loaded_at: SystemTime::now(),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.spec.kind
    }

    pub fn model_id(&self) -> &str {
        &self.spec.model_id
    }

    /// Commit sha reported by the hub, when the model was verified on load.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn image_sizes_parse_from_selector_values() {
        let parsed: Vec<ImageSize> = ["256x256", "512x512", "1024x1024", "auto"]
            .iter()
            .map(|s| ImageSize::from_str(s).unwrap())
            .collect();
        assert_eq!(parsed, ImageSize::iter().collect::<Vec<_>>());
        assert!(ImageSize::from_str("2048x2048").is_err());
    }

    #[test]
    fn kinds_display_as_dotted_identifiers() {
        assert_eq!(ModelKind::Summarizer.to_string(), "text.summarizer");
        assert_eq!(
            ModelKind::from_str("emotion.classifier").unwrap(),
            ModelKind::EmotionClassifier
        );
    }

    #[test]
    fn summarizer_decodes_deterministically_within_bounds() {
        let p = ModelKind::Summarizer.generation_params().unwrap();
        assert_eq!(p.min_length, Some(30));
        assert_eq!(p.max_length, 80);
        assert_eq!(p.do_sample, Some(false));
        assert!(ModelKind::EmotionClassifier.generation_params().is_none());
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let req = InferenceRequest::GenerateImage {
            prompt: "a red fox".into(),
            size: ImageSize::Auto,
            api_key: "sk-secret".into(),
        };
        let dbg = format!("{req:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("a red fox"));
    }

    #[test]
    fn output_accessors_reject_the_wrong_variant() {
        let out = InferenceOutput::Text("hello".into());
        assert!(matches!(
            out.clone().into_scores(),
            Err(CoreError::MalformedResponse(_))
        ));
        assert_eq!(out.into_text().unwrap(), "hello");
    }
}

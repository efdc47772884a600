//! Input collection and validation.
//!
//! Everything here runs before a dispatch: a [`ValidationError`] means the
//! external model is never called.

use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::{ImageSize, InferenceRequest, ModelKind};

/// Canned sentences offered next to the emotion detector's text box.
pub const EMOTION_EXAMPLES: [&str; 7] = [
    "I am thrilled — today was the best day of my life!",
    "I can't believe this happened... I'm shaking.",
    "Why would they do that? I'm so angry.",
    "That's disgusting, I don't want to touch it.",
    "Hmm, interesting... not sure what to feel.",
    "I am so sad and overwhelmed.",
    "Wow! That surprised me!",
];

const PARAPHRASE_PREFIX: &str = "paraphrase: ";

/// Text gathered from a form, plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInput {
    pub text: String,
    pub from_upload: bool,
}

impl TextInput {
    /// Combine the typed text with an optional uploaded file.
    ///
    /// An upload replaces whatever was typed. An upload that is not valid
    /// UTF-8 is an error; the typed text is not used in that case either.
    pub fn collect(typed: Option<&str>, upload: Option<&[u8]>) -> Result<Self, ValidationError> {
        match upload {
            Some(bytes) => Ok(Self {
                text: decode_upload(bytes)?,
                from_upload: true,
            }),
            None => Ok(Self {
                text: typed.unwrap_or_default().to_owned(),
                from_upload: false,
            }),
        }
    }
}

/// Decode an uploaded `.txt` file.
pub fn decode_upload(bytes: &[u8]) -> Result<String, ValidationError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ValidationError::UnreadableUpload)?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_owned())
}

/// Minimum input length, in characters, accepted by each tool.
pub fn min_chars(kind: ModelKind) -> usize {
    match kind {
        ModelKind::Summarizer => 30,
        ModelKind::Paraphraser => 10,
        _ => 1,
    }
}

pub fn validate_text(text: &str, min: usize) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    if text.chars().count() < min {
        return Err(ValidationError::TooShort { min });
    }
    Ok(())
}

pub fn validate_threshold(threshold: f64) -> Result<f64, ValidationError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ValidationError::ThresholdOutOfRange(threshold))
    }
}

/// Validate `text` for a text tool and build its request.
///
/// The paraphraser's input gets the task prefix its model was trained with.
pub fn prepare_text(kind: ModelKind, text: &str) -> Result<InferenceRequest, ValidationError> {
    validate_text(text, min_chars(kind))?;
    match (kind, kind.generation_params()) {
        (ModelKind::EmotionClassifier, _) => Ok(InferenceRequest::Classify {
            text: text.to_owned(),
        }),
        (ModelKind::Paraphraser, Some(params)) => Ok(InferenceRequest::GenerateText {
            text: format!("{PARAPHRASE_PREFIX}{text}"),
            params,
        }),
        (_, Some(params)) => Ok(InferenceRequest::GenerateText {
            text: text.to_owned(),
            params,
        }),
        (_, None) => Err(ValidationError::UnknownTool(kind.to_string())),
    }
}

/// Validate the image form and build its request.
///
/// The API key is checked first, then the prompt, then the size.
pub fn prepare_image(
    api_key: &str,
    prompt: &str,
    size: &str,
) -> Result<InferenceRequest, ValidationError> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(ValidationError::MissingApiKey);
    }
    if prompt.trim().is_empty() {
        return Err(ValidationError::MissingPrompt);
    }
    let size = if size.trim().is_empty() {
        ImageSize::default()
    } else {
        ImageSize::from_str(size.trim())
            .map_err(|_| ValidationError::UnknownSize(size.to_owned()))?
    };
    Ok(InferenceRequest::GenerateImage {
        prompt: prompt.to_owned(),
        size,
        api_key: api_key.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_text_is_rejected() {
        assert_eq!(validate_text("   \n\t", 1), Err(ValidationError::Empty));
        assert_eq!(validate_text("", 1), Err(ValidationError::Empty));
    }

    #[test]
    fn short_text_is_rejected_per_tool() {
        let short = "Too short to summarize.";
        assert_eq!(
            prepare_text(ModelKind::Summarizer, short).unwrap_err(),
            ValidationError::TooShort { min: 30 }
        );
        assert_eq!(
            prepare_text(ModelKind::Paraphraser, "Hi there").unwrap_err(),
            ValidationError::TooShort { min: 10 }
        );
        assert!(prepare_text(ModelKind::GrammarCorrector, "x").is_ok());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // Ten two-byte characters.
        let text = "éééééééééé";
        assert!(validate_text(text, 10).is_ok());
        assert!(validate_text(text, 11).is_err());
    }

    #[test]
    fn paraphrase_input_is_prefixed() {
        match prepare_text(ModelKind::Paraphraser, "The cat sat on the mat.").unwrap() {
            InferenceRequest::GenerateText { text, params } => {
                assert_eq!(text, "paraphrase: The cat sat on the mat.");
                assert_eq!(params.max_length, 60);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn emotion_input_becomes_a_classify_request() {
        let req = prepare_text(ModelKind::EmotionClassifier, "I got the job!").unwrap();
        assert!(matches!(req, InferenceRequest::Classify { text } if text == "I got the job!"));
    }

    #[test]
    fn image_kind_is_not_a_text_tool() {
        assert_eq!(
            prepare_text(ModelKind::ImageGenerator, "a cat").unwrap_err(),
            ValidationError::UnknownTool("image.generator".into())
        );
    }

    #[test]
    fn non_utf8_upload_is_rejected_and_not_used() {
        let err = TextInput::collect(Some("typed"), Some(&[0xff, 0xfe, 0x00, 0x41])).unwrap_err();
        assert_eq!(err, ValidationError::UnreadableUpload);
    }

    #[test]
    fn upload_replaces_typed_text() {
        let input = TextInput::collect(Some("typed"), Some("\u{feff}from file".as_bytes())).unwrap();
        assert_eq!(input.text, "from file");
        assert!(input.from_upload);

        let input = TextInput::collect(Some("typed"), None).unwrap();
        assert_eq!(input.text, "typed");
        assert!(!input.from_upload);
    }

    #[test]
    fn image_form_checks_key_then_prompt() {
        assert_eq!(
            prepare_image("", "", "auto").unwrap_err(),
            ValidationError::MissingApiKey
        );
        assert_eq!(
            prepare_image("sk-1", "  ", "auto").unwrap_err(),
            ValidationError::MissingPrompt
        );
        assert_eq!(
            prepare_image("sk-1", "a fox", "300x300").unwrap_err(),
            ValidationError::UnknownSize("300x300".into())
        );
        match prepare_image(" sk-1 ", "a fox", "").unwrap() {
            InferenceRequest::GenerateImage { size, api_key, .. } => {
                assert_eq!(size, ImageSize::Square256);
                assert_eq!(api_key, "sk-1");
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn threshold_bounds_are_inclusive() {
        assert_eq!(validate_threshold(0.0), Ok(0.0));
        assert_eq!(validate_threshold(1.0), Ok(1.0));
        assert!(validate_threshold(1.01).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
    }
}

use std::time::Duration;

use thiserror::Error;

use crate::types::Capability;

/// Input problems that block a dispatch.
///
/// The `Display` text is written for end users: pages show it verbatim as a
/// warning next to the form.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Please enter some text.")]
    Empty,

    #[error("Please enter a longer text (at least {min} characters).")]
    TooShort { min: usize },

    #[error("Could not read uploaded file (ensure it's UTF-8 .txt).")]
    UnreadableUpload,

    #[error("Please enter your API key!")]
    MissingApiKey,

    #[error("Please enter a prompt!")]
    MissingPrompt,

    #[error("Unknown image size '{0}'; expected one of 256x256, 512x512, 1024x1024, auto.")]
    UnknownSize(String),

    #[error("Confidence threshold {0} must be between 0 and 1.")]
    ThresholdOutOfRange(f64),

    #[error("Unknown tool '{0}'.")]
    UnknownTool(String),
}

/// Errors produced while loading a model or talking to an inference service.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The model could not be resolved or constructed.
    #[error("failed to load model '{model_id}': {message}")]
    ModelLoad { model_id: String, message: String },

    /// The inference service answered with a non-success status.
    #[error("inference service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The request never produced a response (DNS, TLS, connection reset, ...).
    #[error("request to inference service failed: {0}")]
    Transport(String),

    /// The response did not match the expected schema.
    #[error("malformed response from inference service: {0}")]
    MalformedResponse(String),

    /// The client behind a model does not offer the requested capability.
    #[error("{capability} is not supported by model '{model_id}'")]
    Unsupported {
        capability: Capability,
        model_id: String,
    },

    #[error("inference timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("dispatcher queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("dispatcher worker shut down")]
    WorkerShutdown,

    #[error("lock poisoned while trying to {operation}")]
    LockPoisoned { operation: &'static str },
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CoreError::MalformedResponse(e.to_string())
        } else {
            CoreError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_user_facing() {
        assert_eq!(
            ValidationError::TooShort { min: 30 }.to_string(),
            "Please enter a longer text (at least 30 characters)."
        );
        assert_eq!(
            CoreError::from(ValidationError::MissingApiKey).to_string(),
            "Please enter your API key!"
        );
    }

    #[test]
    fn timeout_reports_whole_seconds() {
        let err = CoreError::Timeout(Duration::from_secs(120));
        assert_eq!(err.to_string(), "inference timed out after 120s");
    }
}

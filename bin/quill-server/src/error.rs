//! Unified server error type.
//!
//! JSON handlers return `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`]:
//!
//! | Error                                   | Status | Body key  |
//! |-----------------------------------------|--------|-----------|
//! | input validation                        | 422    | `warning` |
//! | model load / upstream / bad response    | 502    | `error`   |
//! | dispatch timeout                        | 504    | `error`   |
//! | dispatch cancelled                      | 409    | `error`   |
//! | dispatcher queue full                   | 503    | `error`   |
//!
//! Internal failures are logged with full detail; callers only see a generic
//! message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quill_core::{CoreError, ValidationError};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    /// Input rejected before any dispatch.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Propagated from quill-core.
    #[error(transparent)]
    Core(CoreError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ServerError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(v) => ServerError::Validation(v),
            other => ServerError::Core(other),
        }
    }
}

impl From<minijinja::Error> for ServerError {
    fn from(e: minijinja::Error) -> Self {
        ServerError::Internal(format!("template rendering failed: {e:#}"))
    }
}

impl ServerError {
    /// Status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Core(e) => match e {
                CoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CoreError::ModelLoad { .. }
                | CoreError::Upstream { .. }
                | CoreError::Transport(_)
                | CoreError::MalformedResponse(_)
                | CoreError::Unsupported { .. } => StatusCode::BAD_GATEWAY,
                CoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                CoreError::Cancelled => StatusCode::CONFLICT,
                CoreError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
                CoreError::WorkerShutdown | CoreError::LockPoisoned { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Message that is safe to show to the user.
    pub fn client_message(&self) -> String {
        match self {
            ServerError::Validation(v) => v.to_string(),
            ServerError::NotFound(m) | ServerError::BadRequest(m) => m.clone(),
            ServerError::Core(
                CoreError::WorkerShutdown | CoreError::LockPoisoned { .. },
            )
            | ServerError::Internal(_) => "internal server error".to_owned(),
            ServerError::Core(e) => e.to_string(),
        }
    }

    /// Emit the log line matching this error's severity.
    pub fn log(&self) {
        match self {
            ServerError::Validation(v) => warn!(warning = %v, "input rejected"),
            ServerError::NotFound(_) | ServerError::BadRequest(_) => {}
            ServerError::Core(e) if self.status().is_server_error() => {
                error!(error = %e, "inference failed");
            }
            ServerError::Core(e) => warn!(error = %e, "dispatch did not complete"),
            ServerError::Internal(m) => error!(message = %m, "internal server error"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        let body = match &self {
            ServerError::Validation(_) => json!({ "warning": self.client_message() }),
            _ => json!({ "error": self.client_message() }),
        };
        (status, Json(body)).into_response()
    }
}

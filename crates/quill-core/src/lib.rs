//! quill-core – model registry, inference clients and the per-tool
//! input / render logic behind the quill text tools.
//!
//! The usual flow for one user action is:
//!
//! 1. [`input`] collects and validates the text (or image prompt) and turns
//!    it into an [`InferenceRequest`].
//! 2. [`dispatch::Dispatcher`] hands the request to its worker, which
//!    resolves the model through the memoizing [`registry::ModelRegistry`]
//!    and calls the [`client::InferenceClient`].
//! 3. [`render`] turns the raw [`InferenceOutput`] into something a page
//!    can display.

pub mod client;
pub mod dispatch;
pub mod input;
pub mod registry;
pub mod render;

mod error;
mod types;

pub use error::{CoreError, ValidationError};
pub use types::{
    Capability, GenerationParams, ImageSize, InferenceOutput, InferenceRequest, LabelScore,
    ModelHandle, ModelKind, ModelSpec,
};

//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use minijinja::Environment;
use quill_core::client::{
    HfConfig, HfInferenceClient, InferenceClient, OpenAiImageClient, OpenAiImageConfig,
    RoutingClient,
};
use quill_core::dispatch::{Dispatcher, DispatcherConfig};
use quill_core::registry::ModelRegistry;

use crate::config::Config;
use crate::templates;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Owns the external calls; also gives access to the model registry.
    pub dispatcher: Dispatcher,
    /// Page templates.
    pub templates: Arc<Environment<'static>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the hosted clients described by `config`. Must be called inside
    /// a Tokio runtime (the dispatcher spawns its worker).
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let text = HfInferenceClient::new(HfConfig {
            endpoint: config.hf_endpoint.clone(),
            token: config.hf_token.clone(),
            verify_models: config.verify_models,
        });
        let image = OpenAiImageClient::new(OpenAiImageConfig {
            base_url: config.openai_base_url.clone(),
        });
        let client = RoutingClient::new(Arc::new(text), Arc::new(image));
        Self::with_client(config, Arc::new(client))
    }

    /// Build state around an arbitrary inference client.
    pub fn with_client(config: Config, client: Arc<dyn InferenceClient>) -> anyhow::Result<Self> {
        let registry = config
            .model_overrides
            .iter()
            .fold(ModelRegistry::new(client), |r, (kind, id)| {
                r.with_model(*kind, id.clone())
            });
        let dispatcher = Dispatcher::start(
            Arc::new(registry),
            DispatcherConfig {
                queue_capacity: config.queue_capacity,
                default_timeout: config.request_timeout,
            },
        );
        Ok(Self {
            config: Arc::new(config),
            dispatcher,
            templates: Arc::new(templates::environment()?),
        })
    }
}

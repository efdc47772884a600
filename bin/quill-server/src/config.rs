//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use quill_core::ModelKind;

/// Runtime configuration for quill-server.
///
/// Every field has a default so the server starts without any environment
/// variables set. The image API key is deliberately absent: it is supplied
/// per request.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Base URL of the Hugging Face inference service.
    pub hf_endpoint: String,

    /// Optional Hugging Face access token.
    pub hf_token: Option<String>,

    /// Resolve hub metadata when a text model is first loaded.
    pub verify_models: bool,

    /// Base URL of the OpenAI-compatible images API.
    pub openai_base_url: String,

    /// Deadline for one dispatch.
    pub request_timeout: Duration,

    /// Dispatcher ingress queue capacity.
    pub queue_capacity: usize,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// Hosted model overrides, one per kind at most.
    pub model_overrides: Vec<(ModelKind, String)>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("hf_endpoint", &self.hf_endpoint)
            .field("hf_token", &self.hf_token.as_ref().map(|_| "<redacted>"))
            .field("verify_models", &self.verify_models)
            .field("openai_base_url", &self.openai_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("queue_capacity", &self.queue_capacity)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("enable_swagger", &self.enable_swagger)
            .field("model_overrides", &self.model_overrides)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            hf_endpoint: quill_core::client::hf::DEFAULT_ENDPOINT.to_owned(),
            hf_token: None,
            verify_models: true,
            openai_base_url: quill_core::client::openai::DEFAULT_BASE_URL.to_owned(),
            request_timeout: Duration::from_secs(120),
            queue_capacity: 64,
            cors_allowed_origins: None,
            enable_swagger: true,
            model_overrides: Vec::new(),
        }
    }
}

const MODEL_VARS: [(&str, ModelKind); 5] = [
    ("QUILL_EMOTION_MODEL", ModelKind::EmotionClassifier),
    ("QUILL_GRAMMAR_MODEL", ModelKind::GrammarCorrector),
    ("QUILL_SUMMARIZER_MODEL", ModelKind::Summarizer),
    ("QUILL_PARAPHRASER_MODEL", ModelKind::Paraphraser),
    ("QUILL_IMAGE_MODEL", ModelKind::ImageGenerator),
];

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bind_address: env_or("QUILL_BIND", &d.bind_address),
            log_level: env_or("QUILL_LOG", &d.log_level),
            log_json: env_flag("QUILL_LOG_JSON", d.log_json),
            hf_endpoint: env_or("QUILL_HF_ENDPOINT", &d.hf_endpoint),
            hf_token: std::env::var("QUILL_HF_TOKEN")
                .or_else(|_| std::env::var("HF_TOKEN"))
                .ok()
                .filter(|t| !t.trim().is_empty()),
            verify_models: env_flag("QUILL_VERIFY_MODELS", d.verify_models),
            openai_base_url: env_or("QUILL_OPENAI_BASE_URL", &d.openai_base_url),
            request_timeout: Duration::from_secs(parse_env(
                "QUILL_REQUEST_TIMEOUT_SECS",
                d.request_timeout.as_secs(),
            )),
            queue_capacity: parse_env("QUILL_QUEUE_CAPACITY", d.queue_capacity),
            cors_allowed_origins: std::env::var("QUILL_CORS_ORIGINS").ok(),
            enable_swagger: env_flag("QUILL_ENABLE_SWAGGER", d.enable_swagger),
            model_overrides: MODEL_VARS
                .iter()
                .filter_map(|(key, kind)| {
                    std::env::var(key)
                        .ok()
                        .filter(|v| !v.trim().is_empty())
                        .map(|v| (*kind, v))
                })
                .collect(),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v).unwrap_or(default))
        .unwrap_or(default)
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim() {
        "1" => Some(true),
        "0" => Some(false),
        s if s.eq_ignore_ascii_case("true") => Some(true),
        s if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_address, "0.0.0.0:3000");
        assert_eq!(cfg.request_timeout, Duration::from_secs(120));
        assert_eq!(cfg.queue_capacity, 64);
        assert!(cfg.enable_swagger);
        assert!(cfg.model_overrides.is_empty());
    }

    #[test]
    fn flags_accept_numbers_and_words() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("yes please"), None);
    }

    #[test]
    fn debug_output_redacts_token() {
        let cfg = Config {
            hf_token: Some("hf_secret".into()),
            ..Config::default()
        };
        let out = format!("{cfg:?}");
        assert!(!out.contains("hf_secret"));
        assert!(out.contains("<redacted>"));
    }
}

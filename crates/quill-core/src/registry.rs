//! Memoizing model registry.
//!
//! Each [`ModelKind`] owns one `OnceCell` slot. The first `get` for a kind
//! runs the client's `load` while holding that slot's initialization guard,
//! so concurrent first uses wait for a single load instead of racing. A
//! failed load leaves the slot empty and the next `get` tries again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use strum::IntoEnumIterator;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::client::InferenceClient;
use crate::error::CoreError;
use crate::types::{ModelHandle, ModelKind, ModelSpec};

type Slot = Arc<OnceCell<Arc<ModelHandle>>>;

pub struct ModelRegistry {
    client: Arc<dyn InferenceClient>,
    specs: HashMap<ModelKind, ModelSpec>,
    slots: Mutex<HashMap<ModelKind, Slot>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("loaded", &self.loaded())
            .finish()
    }
}

impl ModelRegistry {
    /// Create a registry with every kind mapped to its default model.
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        let specs = ModelKind::iter()
            .map(|k| (k, ModelSpec::default_for(k)))
            .collect();
        Self {
            client,
            specs,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Override the hosted model used for `kind`.
    ///
    /// Only meaningful before the first `get` for that kind.
    pub fn with_model(mut self, kind: ModelKind, model_id: impl Into<String>) -> Self {
        self.specs.insert(kind, ModelSpec::new(kind, model_id));
        self
    }

    pub fn client(&self) -> &Arc<dyn InferenceClient> {
        &self.client
    }

    pub fn spec(&self, kind: ModelKind) -> ModelSpec {
        self.specs
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ModelSpec::default_for(kind))
    }

    fn slot(&self, kind: ModelKind) -> Result<Slot, CoreError> {
        let mut slots = self.slots.lock().map_err(|_| CoreError::LockPoisoned {
            operation: "lock model registry slots",
        })?;
        Ok(Arc::clone(slots.entry(kind).or_default()))
    }

    /// Return the handle for `kind`, loading it on first use.
    ///
    /// Every successful call for the same kind returns the same `Arc`.
    pub async fn get(&self, kind: ModelKind) -> Result<Arc<ModelHandle>, CoreError> {
        let slot = self.slot(kind)?;
        let handle = slot
            .get_or_try_init(|| async {
                let spec = self.spec(kind);
                info!(kind = %kind, model_id = %spec.model_id, "loading model");
                let started = Instant::now();
                match self.client.load(&spec).await {
                    Ok(handle) => {
                        info!(
                            kind = %kind,
                            model_id = %spec.model_id,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "model loaded"
                        );
                        Ok(Arc::new(handle))
                    }
                    Err(e) => {
                        warn!(kind = %kind, model_id = %spec.model_id, error = %e, "model load failed");
                        Err(e)
                    }
                }
            })
            .await?;
        Ok(Arc::clone(handle))
    }

    /// The handle for `kind` if it has been loaded. Never triggers a load.
    pub fn peek(&self, kind: ModelKind) -> Option<Arc<ModelHandle>> {
        let slots = self.slots.lock().ok()?;
        slots.get(&kind).and_then(|s| s.get()).cloned()
    }

    pub fn is_loaded(&self, kind: ModelKind) -> bool {
        self.peek(kind).is_some()
    }

    /// Kinds whose handle has been constructed.
    pub fn loaded(&self) -> Vec<ModelKind> {
        ModelKind::iter().filter(|k| self.is_loaded(*k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::types::{InferenceOutput, InferenceRequest};

    /// Counts loads; optionally fails the first `fail_first` of them and
    /// sleeps inside `load` to widen race windows.
    #[derive(Default)]
    struct CountingClient {
        loads: AtomicUsize,
        fail_first: usize,
        delay: Duration,
    }

    #[async_trait]
    impl InferenceClient for CountingClient {
        async fn load(&self, spec: &ModelSpec) -> Result<ModelHandle, CoreError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if n < self.fail_first {
                return Err(CoreError::ModelLoad {
                    model_id: spec.model_id.clone(),
                    message: "weights unavailable".into(),
                });
            }
            Ok(ModelHandle::new(spec.clone(), Some(format!("rev-{n}"))))
        }

        async fn infer(
            &self,
            _handle: &ModelHandle,
            _request: InferenceRequest,
        ) -> Result<InferenceOutput, CoreError> {
            Ok(InferenceOutput::Text(String::new()))
        }
    }

    #[tokio::test]
    async fn successive_gets_return_the_same_handle() {
        let client = Arc::new(CountingClient::default());
        let registry = ModelRegistry::new(client.clone());

        let a = registry.get(ModelKind::GrammarCorrector).await.unwrap();
        let b = registry.get(ModelKind::GrammarCorrector).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(client.loads.load(Ordering::SeqCst), 1);
        assert!(registry.is_loaded(ModelKind::GrammarCorrector));
        assert!(!registry.is_loaded(ModelKind::Summarizer));
    }

    #[tokio::test]
    async fn kinds_are_memoized_independently() {
        let client = Arc::new(CountingClient::default());
        let registry = ModelRegistry::new(client.clone());

        let grammar = registry.get(ModelKind::GrammarCorrector).await.unwrap();
        let summary = registry.get(ModelKind::Summarizer).await.unwrap();

        assert!(!Arc::ptr_eq(&grammar, &summary));
        assert_eq!(client.loads.load(Ordering::SeqCst), 2);
        assert_eq!(
            registry.loaded(),
            vec![ModelKind::GrammarCorrector, ModelKind::Summarizer]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_loads_once() {
        let client = Arc::new(CountingClient {
            delay: Duration::from_millis(50),
            ..CountingClient::default()
        });
        let registry = Arc::new(ModelRegistry::new(client.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get(ModelKind::EmotionClassifier).await })
            })
            .collect();

        let mut handles = Vec::new();
        for t in tasks {
            handles.push(t.await.unwrap().unwrap());
        }

        assert_eq!(client.loads.load(Ordering::SeqCst), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let client = Arc::new(CountingClient {
            fail_first: 1,
            ..CountingClient::default()
        });
        let registry = ModelRegistry::new(client.clone());

        let err = registry.get(ModelKind::Paraphraser).await.unwrap_err();
        assert!(matches!(err, CoreError::ModelLoad { .. }));
        assert!(!registry.is_loaded(ModelKind::Paraphraser));

        registry.get(ModelKind::Paraphraser).await.unwrap();
        assert_eq!(client.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn peek_reports_the_loaded_handle_without_loading() {
        let client = Arc::new(CountingClient::default());
        let registry = ModelRegistry::new(client.clone());

        assert!(registry.peek(ModelKind::EmotionClassifier).is_none());
        assert_eq!(client.loads.load(Ordering::SeqCst), 0);

        let loaded = registry.get(ModelKind::EmotionClassifier).await.unwrap();
        let peeked = registry.peek(ModelKind::EmotionClassifier).unwrap();
        assert!(Arc::ptr_eq(&loaded, &peeked));
        assert_eq!(peeked.revision(), Some("rev-0"));
        assert!(peeked.loaded_at() <= std::time::SystemTime::now());
    }

    #[tokio::test]
    async fn overridden_model_id_is_passed_to_load() {
        let registry = ModelRegistry::new(Arc::new(CountingClient::default()))
            .with_model(ModelKind::Summarizer, "facebook/bart-large-cnn");

        let handle = registry.get(ModelKind::Summarizer).await.unwrap();
        assert_eq!(handle.model_id(), "facebook/bart-large-cnn");
        assert_eq!(
            registry.spec(ModelKind::GrammarCorrector).model_id,
            ModelKind::GrammarCorrector.default_model_id()
        );
    }
}

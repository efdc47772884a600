//! Dispatch worker.
//!
//! Every external inference call runs on a task owned by the dispatcher
//! worker rather than inside the caller's future. Callers talk to it
//! through a bounded ingress queue and get exactly one reply per job:
//!
//! ```text
//!   caller ──DispatchRequest──▶ worker ──spawn──▶ job task
//!      ▲                                             │
//!      └──────────────── oneshot reply ◀─────────────┘
//! ```
//!
//! At most `queue_capacity` jobs are accepted at once, queued and running
//! together; a job holds its slot until its task finishes. Past that,
//! [`Dispatcher::run`] fails fast with [`CoreError::QueueFull`].
//!
//! Each job carries a `watch` cancellation signal. It fires when the
//! caller's timeout expires, when [`Dispatcher::cancel`] is called with the
//! job's request id, or when the caller stops waiting (its future is
//! dropped). Nothing is retried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use strum::{Display, IntoEnumIterator};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::registry::ModelRegistry;
use crate::types::{InferenceOutput, InferenceRequest, ModelKind};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration passed to [`Dispatcher::start`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Jobs accepted at once, queued or running. Defaults to `64`.
    pub queue_capacity: usize,
    /// Deadline for jobs that do not carry their own. Defaults to 120 s.
    pub default_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// One unit of work for the dispatcher.
#[derive(Debug)]
pub struct Job {
    pub kind: ModelKind,
    pub request: InferenceRequest,
    /// Identifier under which the job can be cancelled.
    pub request_id: Option<String>,
    /// Overrides [`DispatcherConfig::default_timeout`].
    pub timeout: Option<Duration>,
}

impl Job {
    pub fn new(kind: ModelKind, request: InferenceRequest) -> Self {
        Self {
            kind,
            request,
            request_id: None,
            timeout: None,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Per-tool interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolState {
    /// No pending request; input is editable.
    Idle,
    /// Waiting on an external call.
    Dispatching,
}

/// Message sent from [`Dispatcher::run`] to the worker.
struct DispatchRequest {
    kind: ModelKind,
    request: InferenceRequest,
    cancel_rx: watch::Receiver<bool>,
    reply_tx: oneshot::Sender<Result<InferenceOutput, CoreError>>,
    _slot: OwnedSemaphorePermit,
}

/// Counts in-flight jobs per kind.
struct StateBoard {
    active: HashMap<ModelKind, AtomicUsize>,
}

impl StateBoard {
    fn new() -> Self {
        Self {
            active: ModelKind::iter().map(|k| (k, AtomicUsize::new(0))).collect(),
        }
    }

    fn enter(self: &Arc<Self>, kind: ModelKind) -> BusyGuard {
        if let Some(n) = self.active.get(&kind) {
            n.fetch_add(1, Ordering::SeqCst);
        }
        BusyGuard {
            board: Arc::clone(self),
            kind,
        }
    }

    fn state(&self, kind: ModelKind) -> ToolState {
        match self.active.get(&kind).map(|n| n.load(Ordering::SeqCst)) {
            Some(n) if n > 0 => ToolState::Dispatching,
            _ => ToolState::Idle,
        }
    }
}

/// Returns its kind to `Idle` (or decrements the in-flight count) on drop,
/// whatever way the job ended.
struct BusyGuard {
    board: Arc<StateBoard>,
    kind: ModelKind,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if let Some(n) = self.board.active.get(&self.kind) {
            n.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Cancellation senders of in-flight jobs, keyed by request id.
#[derive(Default)]
struct CancelMap {
    next_token: AtomicU64,
    senders: Mutex<HashMap<String, (u64, watch::Sender<bool>)>>,
}

impl CancelMap {
    fn register(self: &Arc<Self>, id: String, tx: watch::Sender<bool>) -> Registration {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = self.senders.lock() {
            map.insert(id.clone(), (token, tx));
        }
        Registration {
            map: Arc::clone(self),
            id,
            token,
        }
    }

    fn cancel(&self, id: &str) -> bool {
        let entry = self.senders.lock().ok().and_then(|mut map| map.remove(id));
        match entry {
            Some((_, tx)) => {
                let _ = tx.send(true);
                true
            }
            None => false,
        }
    }
}

/// Removes its entry from the [`CancelMap`] on drop, unless a newer job
/// has since registered under the same id.
struct Registration {
    map: Arc<CancelMap>,
    id: String,
    token: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Ok(mut map) = self.map.senders.lock() {
            if map.get(&self.id).is_some_and(|(t, _)| *t == self.token) {
                map.remove(&self.id);
            }
        }
    }
}

/// Fires the job's cancellation signal when dropped.
struct CancelOnDrop(watch::Sender<bool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let _ = self.0.send(true);
    }
}

/// Handle to the dispatch worker. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    ingress: mpsc::Sender<DispatchRequest>,
    slots: Arc<Semaphore>,
    registry: Arc<ModelRegistry>,
    board: Arc<StateBoard>,
    cancels: Arc<CancelMap>,
    config: DispatcherConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

impl Dispatcher {
    /// Spawn the worker task. Must be called inside a Tokio runtime.
    pub fn start(registry: Arc<ModelRegistry>, config: DispatcherConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (ingress, mut rx) = mpsc::channel::<DispatchRequest>(capacity);
        let worker_registry = Arc::clone(&registry);
        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                let registry = Arc::clone(&worker_registry);
                tokio::spawn(execute(registry, req));
            }
            debug!("dispatcher worker stopped");
        });

        Self {
            ingress,
            slots: Arc::new(Semaphore::new(capacity)),
            registry,
            board: Arc::new(StateBoard::new()),
            cancels: Arc::new(CancelMap::default()),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout
    }

    pub fn state(&self, kind: ModelKind) -> ToolState {
        self.board.state(kind)
    }

    /// Cancel the in-flight job registered under `request_id`.
    ///
    /// Returns `false` if no such job is running.
    pub fn cancel(&self, request_id: &str) -> bool {
        let found = self.cancels.cancel(request_id);
        if found {
            info!(request_id, "dispatch cancellation requested");
        }
        found
    }

    /// Submit `job` and wait for its result.
    pub async fn run(&self, job: Job) -> Result<InferenceOutput, CoreError> {
        let Job {
            kind,
            request,
            request_id,
            timeout,
        } = job;
        let timeout = timeout.unwrap_or(self.config.default_timeout);

        let slot = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => {
                    warn!(kind = %kind, capacity = self.config.queue_capacity, "dispatch queue full");
                    CoreError::QueueFull {
                        capacity: self.config.queue_capacity,
                    }
                }
                TryAcquireError::Closed => CoreError::WorkerShutdown,
            })?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (reply_tx, reply_rx) = oneshot::channel();

        let _busy = self.board.enter(kind);
        let _registration = request_id
            .clone()
            .map(|id| self.cancels.register(id, cancel_tx.clone()));
        let cancel = CancelOnDrop(cancel_tx);

        self.ingress
            .try_send(DispatchRequest {
                kind,
                request,
                cancel_rx,
                reply_tx,
                _slot: slot,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => CoreError::QueueFull {
                    capacity: self.config.queue_capacity,
                },
                mpsc::error::TrySendError::Closed(_) => CoreError::WorkerShutdown,
            })?;
        debug!(kind = %kind, request_id = ?request_id, "dispatch submitted");

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CoreError::WorkerShutdown),
            Err(_) => {
                warn!(kind = %kind, request_id = ?request_id, timeout_s = timeout.as_secs(), "dispatch timed out");
                drop(cancel);
                Err(CoreError::Timeout(timeout))
            }
        }
    }
}

/// Resolve the model and run one request, racing it against cancellation.
async fn execute(registry: Arc<ModelRegistry>, req: DispatchRequest) {
    let DispatchRequest {
        kind,
        request,
        mut cancel_rx,
        reply_tx,
        _slot: slot,
    } = req;

    let work = async {
        let handle = registry.get(kind).await?;
        registry.client().infer(&handle, request).await
    };

    let cancelled = async {
        if cancel_rx.wait_for(|c| *c).await.is_err() {
            // Sender gone without a cancel: only `work` can finish the job.
            std::future::pending::<()>().await;
        }
    };

    let result = tokio::select! {
        r = work => r,
        _ = cancelled => {
            info!(kind = %kind, "dispatch cancelled");
            Err(CoreError::Cancelled)
        }
    };

    if let Err(e) = &result {
        debug!(kind = %kind, error = %e, "dispatch failed");
    }
    drop(slot);
    let _ = reply_tx.send(result);
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;
    use crate::client::InferenceClient;
    use crate::input::prepare_text;
    use crate::types::{LabelScore, ModelHandle, ModelSpec};

    /// Answers classification with fixed scores and generation by echoing,
    /// after an optional delay.
    #[derive(Default)]
    struct MockClient {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceClient for MockClient {
        async fn load(&self, spec: &ModelSpec) -> Result<ModelHandle, CoreError> {
            Ok(ModelHandle::new(spec.clone(), None))
        }

        async fn infer(
            &self,
            _handle: &ModelHandle,
            request: InferenceRequest,
        ) -> Result<InferenceOutput, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match request {
                InferenceRequest::Classify { .. } => Ok(InferenceOutput::Scores(vec![LabelScore {
                    label: "joy".into(),
                    score: 0.9,
                }])),
                InferenceRequest::GenerateText { text, .. } => Ok(InferenceOutput::Text(text)),
                InferenceRequest::GenerateImage { .. } => Err(CoreError::Upstream {
                    status: 401,
                    message: "Incorrect API key provided".into(),
                }),
            }
        }
    }

    fn dispatcher(delay: Duration) -> (Dispatcher, Arc<MockClient>) {
        dispatcher_with(delay, DispatcherConfig::default())
    }

    fn dispatcher_with(delay: Duration, config: DispatcherConfig) -> (Dispatcher, Arc<MockClient>) {
        let client = Arc::new(MockClient {
            delay,
            ..MockClient::default()
        });
        let registry = Arc::new(ModelRegistry::new(client.clone()));
        (Dispatcher::start(registry, config), client)
    }

    #[tokio::test]
    async fn run_returns_model_output_and_memoizes_the_handle() {
        let (d, client) = dispatcher(Duration::ZERO);
        let req = prepare_text(ModelKind::GrammarCorrector, "He go to school yesterday.").unwrap();

        let out = d.run(Job::new(ModelKind::GrammarCorrector, req.clone())).await.unwrap();
        assert_eq!(out.into_text().unwrap(), "He go to school yesterday.");

        let first = d.registry().get(ModelKind::GrammarCorrector).await.unwrap();
        d.run(Job::new(ModelKind::GrammarCorrector, req)).await.unwrap();
        let second = d.registry().get(ModelKind::GrammarCorrector).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn upstream_failure_is_returned_once_and_state_goes_idle() {
        let (d, client) = dispatcher(Duration::ZERO);
        let req = crate::input::prepare_image("sk-bad", "a fox", "auto").unwrap();

        let err = d.run(Job::new(ModelKind::ImageGenerator, req)).await.unwrap_err();
        assert!(matches!(err, CoreError::Upstream { status: 401, .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(d.state(ModelKind::ImageGenerator), ToolState::Idle);
    }

    #[tokio::test]
    async fn state_is_dispatching_while_in_flight() {
        let (d, _) = dispatcher(Duration::from_millis(200));
        let req = prepare_text(ModelKind::EmotionClassifier, "I got the job!").unwrap();

        let runner = d.clone();
        let pending = tokio::spawn(async move {
            runner.run(Job::new(ModelKind::EmotionClassifier, req)).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(d.state(ModelKind::EmotionClassifier), ToolState::Dispatching);
        assert_eq!(d.state(ModelKind::Summarizer), ToolState::Idle);

        pending.await.unwrap().unwrap();
        assert_eq!(d.state(ModelKind::EmotionClassifier), ToolState::Idle);
    }

    #[tokio::test]
    #[traced_test]
    async fn slow_call_times_out() {
        let (d, _) = dispatcher(Duration::from_secs(5));
        let req = prepare_text(ModelKind::GrammarCorrector, "text").unwrap();

        let err = d
            .run(Job::new(ModelKind::GrammarCorrector, req).with_timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Timeout(_)));
        assert_eq!(d.state(ModelKind::GrammarCorrector), ToolState::Idle);
        assert!(logs_contain("dispatch timed out"));
    }

    #[tokio::test]
    async fn in_flight_job_can_be_cancelled_by_id() {
        let (d, _) = dispatcher(Duration::from_secs(5));
        let req = prepare_text(ModelKind::GrammarCorrector, "text").unwrap();

        let runner = d.clone();
        let pending = tokio::spawn(async move {
            runner
                .run(Job::new(ModelKind::GrammarCorrector, req).with_request_id("req-1"))
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(d.cancel("req-1"));
        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));

        assert!(!d.cancel("req-1"), "finished job must be unregistered");
        assert_eq!(d.state(ModelKind::GrammarCorrector), ToolState::Idle);
    }

    #[tokio::test]
    #[traced_test]
    async fn jobs_beyond_capacity_are_rejected_until_a_slot_frees() {
        let config = DispatcherConfig {
            queue_capacity: 2,
            ..DispatcherConfig::default()
        };
        let (d, client) = dispatcher_with(Duration::from_millis(300), config);
        let req = prepare_text(ModelKind::GrammarCorrector, "text").unwrap();

        let pending: Vec<_> = (0..2)
            .map(|_| {
                let runner = d.clone();
                let req = req.clone();
                tokio::spawn(async move { runner.run(Job::new(ModelKind::GrammarCorrector, req)).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = d
            .run(Job::new(ModelKind::GrammarCorrector, req.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::QueueFull { capacity: 2 }));
        assert!(logs_contain("dispatch queue full"));

        for p in pending {
            p.await.unwrap().unwrap();
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);

        d.run(Job::new(ModelKind::GrammarCorrector, req)).await.unwrap();
        assert_eq!(d.state(ModelKind::GrammarCorrector), ToolState::Idle);
    }

    #[tokio::test]
    async fn cancelling_unknown_id_is_a_no_op() {
        let (d, _) = dispatcher(Duration::ZERO);
        assert!(!d.cancel("nope"));
    }
}

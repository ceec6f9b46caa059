//! Test harness
//!
//! Wires the full pipeline (store, journal, tracker, consolidation engine,
//! processor worker) over the in-memory store and the mock upstream
//! clients, with helpers for waiting out the asynchronous pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use engram_core::{
    event_queue, AssociationTracker, CaptureInput, ConsolidationEngine, EngramConfig, EventQueue,
    InMemoryStore, Journal, Memory, MemoryKind, MemoryProcessor, ProcessorHandle, VectorStore,
};

use crate::mocks::{GeneratorScript, MockEmbedder, MockGenerator, MOCK_DIMENSIONS};

/// How long `wait_until` polls before giving up
const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval for pipeline quiescence
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A fully wired engine over mock upstreams
pub struct TestSystem {
    pub config: Arc<EngramConfig>,
    pub store: Arc<dyn VectorStore>,
    pub journal: Arc<Journal>,
    pub tracker: AssociationTracker,
    pub engine: Arc<ConsolidationEngine>,
    pub handle: ProcessorHandle,
    pub embedder: Arc<MockEmbedder>,
    pub generator: Arc<MockGenerator>,
    queue: Option<EventQueue>,
    shutdown: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    worker: Option<JoinHandle<()>>,
}

impl TestSystem {
    /// Build the system without starting the worker. Most tests call
    /// [`TestSystem::start`] instead; building paused lets the
    /// queue-overflow tests fill the queue first.
    pub async fn build(
        script: GeneratorScript,
        mutate: impl FnOnce(&mut EngramConfig),
    ) -> Self {
        let mut config = EngramConfig::default();
        config.embedding_dimensions = MOCK_DIMENSIONS;
        mutate(&mut config);
        config.validate().expect("test config must be valid");
        let config = Arc::new(config);

        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
        store
            .ensure_collections(config.embedding_dimensions)
            .await
            .expect("collections");

        let embedder = Arc::new(MockEmbedder::new());
        let generator = Arc::new(MockGenerator::new(script));

        let (handle, queue) = event_queue(config.queue_capacity);
        let journal = Arc::new(Journal::new(
            Arc::clone(&store),
            Arc::clone(&embedder) as Arc<dyn engram_core::Embedder>,
            handle.clone(),
            &config,
        ));
        let tracker = AssociationTracker::new(Arc::clone(&store), Arc::clone(&config));
        let engine = Arc::new(ConsolidationEngine::new(
            Arc::clone(&journal),
            Arc::clone(&generator) as Arc<dyn engram_core::Generator>,
            Arc::clone(&config),
        ));

        let (shutdown, shutdown_rx) = watch::channel(false);
        Self {
            config,
            store,
            journal,
            tracker,
            engine,
            handle,
            embedder,
            generator,
            queue: Some(queue),
            shutdown,
            shutdown_rx,
            worker: None,
        }
    }

    /// Build and immediately start the worker
    pub async fn start(
        script: GeneratorScript,
        mutate: impl FnOnce(&mut EngramConfig),
    ) -> Self {
        let mut system = Self::build(script, mutate).await;
        system.start_worker();
        system
    }

    /// Spawn the processor worker over the queue built earlier
    pub fn start_worker(&mut self) {
        let queue = self.queue.take().expect("worker already started");
        let processor = MemoryProcessor::new(
            Arc::clone(&self.journal),
            self.tracker.clone(),
            Arc::clone(&self.engine),
            &self.config,
        );
        self.worker = Some(processor.spawn(queue, self.shutdown_rx.clone()));
    }

    /// Signal shutdown and wait for the worker to drain
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(worker) = self.worker.take() {
            let _ = tokio::time::timeout(Duration::from_secs(35), worker).await;
        }
    }

    /// Capture a memory with optional session metadata
    pub fn capture(&self, content: &str, session_id: Option<&str>) -> Memory {
        let mut input = CaptureInput::new(content);
        if let Some(session_id) = session_id {
            let mut metadata = BTreeMap::new();
            metadata.insert("session_id".to_string(), session_id.to_string());
            input.metadata = metadata;
        }
        self.journal.capture(input).expect("capture")
    }

    /// Capture several memories and wait until they are all stored
    pub async fn capture_all(&self, contents: &[&str], session_id: Option<&str>) -> Vec<Memory> {
        let before = self
            .store
            .count(MemoryKind::Episodic)
            .await
            .expect("count");
        let memories: Vec<Memory> = contents
            .iter()
            .map(|content| self.capture(content, session_id))
            .collect();
        self.wait_for_episodic(before + contents.len() as u64).await;
        memories
    }

    /// Poll until the episodic collection reaches `count`
    pub async fn wait_for_episodic(&self, count: u64) {
        let store = Arc::clone(&self.store);
        Self::wait_until(move || {
            let store = Arc::clone(&store);
            async move { store.count(MemoryKind::Episodic).await.unwrap_or(0) >= count }
        })
        .await;
    }

    /// Poll until a memory has at least `count` outgoing associations
    pub async fn wait_for_associations(&self, id: &str, count: usize) {
        let store = Arc::clone(&self.store);
        let id = id.to_string();
        Self::wait_until(move || {
            let store = Arc::clone(&store);
            let id = id.clone();
            async move {
                store
                    .associations_by_source(&id)
                    .await
                    .map(|edges| edges.len() >= count)
                    .unwrap_or(false)
            }
        })
        .await;
    }

    /// Poll a condition until it holds or the wait timeout elapses
    pub async fn wait_until<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            if condition().await {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("condition not met within {WAIT_TIMEOUT:?}");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

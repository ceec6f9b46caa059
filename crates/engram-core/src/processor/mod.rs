//! Memory processor
//!
//! The long-running event loop that decouples synchronous capture from the
//! slow parts of the pipeline. One bounded FIFO, one worker: per-memory
//! ordering (embed -> store -> associate) comes for free, and the
//! association tracker never races itself. Producers never block; a full
//! queue drops the event and bumps a counter.
//!
//! Worker-side upstream calls carry their own deadlines. They are never
//! derived from the originating HTTP request, so a disconnecting client
//! cannot cancel half-finished background work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::associations::AssociationTracker;
use crate::config::EngramConfig;
use crate::consolidation::{ConsolidationEngine, ConsolidationTrigger};
use crate::journal::Journal;
use crate::memory::Memory;

// ============================================================================
// EVENTS
// ============================================================================

/// Events consumed by the worker
#[derive(Debug, Clone)]
pub enum MemoryEvent {
    /// A freshly captured memory awaiting embedding, storage, and
    /// association analysis
    NewContext(Memory),
    /// Ask the worker to consider consolidation now
    ThresholdReached,
    /// A conversation ended; flush with a final consolidation
    ConversationEnd { session_id: Option<String> },
    /// Warm-start hook; currently a no-op
    ContextInit,
}

impl MemoryEvent {
    fn kind(&self) -> &'static str {
        match self {
            MemoryEvent::NewContext(_) => "new_context",
            MemoryEvent::ThresholdReached => "threshold_reached",
            MemoryEvent::ConversationEnd { .. } => "conversation_end",
            MemoryEvent::ContextInit => "context_init",
        }
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Producer side of the event queue
///
/// Cheap to clone; `enqueue` is non-blocking by contract (capture is
/// advisory) and overflow is only visible through [`dropped_events`].
///
/// [`dropped_events`]: ProcessorHandle::dropped_events
#[derive(Clone)]
pub struct ProcessorHandle {
    sender: mpsc::Sender<MemoryEvent>,
    dropped: Arc<AtomicU64>,
}

impl ProcessorHandle {
    /// Non-blocking enqueue. Returns whether the event was accepted.
    pub fn enqueue(&self, event: MemoryEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(event = event.kind(), dropped_total = total, "event queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(event = event.kind(), "event queue closed, dropping event");
                false
            }
        }
    }

    /// Enqueue a freshly captured memory
    pub fn enqueue_new_context(&self, memory: Memory) -> bool {
        self.enqueue(MemoryEvent::NewContext(memory))
    }

    /// Number of events dropped since startup
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer side of the event queue, passed to [`MemoryProcessor::spawn`]
pub struct EventQueue {
    receiver: mpsc::Receiver<MemoryEvent>,
}

impl EventQueue {
    /// Receive the next event directly, bypassing the worker
    pub(crate) async fn recv(&mut self) -> Option<MemoryEvent> {
        self.receiver.recv().await
    }
}

/// Create the bounded event queue
pub fn event_queue(capacity: usize) -> (ProcessorHandle, EventQueue) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        ProcessorHandle {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        EventQueue { receiver },
    )
}

// ============================================================================
// PROCESSOR
// ============================================================================

/// The background worker (C6)
pub struct MemoryProcessor {
    journal: Arc<Journal>,
    tracker: AssociationTracker,
    engine: Arc<ConsolidationEngine>,
    consolidation_threshold: usize,
    drain_timeout: Duration,
    /// Captures processed since the last consolidation
    processed_since_consolidation: usize,
}

impl MemoryProcessor {
    /// Create a worker over the journal, tracker, and consolidation engine
    pub fn new(
        journal: Arc<Journal>,
        tracker: AssociationTracker,
        engine: Arc<ConsolidationEngine>,
        config: &EngramConfig,
    ) -> Self {
        Self {
            journal,
            tracker,
            engine,
            consolidation_threshold: config.consolidation_threshold,
            drain_timeout: config.drain_timeout,
            processed_since_consolidation: 0,
        }
    }

    /// Spawn the worker task. It runs until the queue closes or `shutdown`
    /// flips to `true`, then drains for up to the drain timeout.
    pub fn spawn(mut self, mut queue: EventQueue, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("memory processor started");
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            self.drain(&mut queue).await;
                            break;
                        }
                    }
                    event = queue.receiver.recv() => {
                        match event {
                            Some(event) => self.handle(event).await,
                            None => break,
                        }
                    }
                }
            }
            info!("memory processor stopped");
        })
    }

    /// Process remaining events for up to the drain timeout; anything left
    /// after that is discarded with a logged count.
    async fn drain(&mut self, queue: &mut EventQueue) {
        let deadline = tokio::time::Instant::now() + self.drain_timeout;
        let mut drained = 0_usize;

        loop {
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            match queue.receiver.try_recv() {
                Ok(event) => {
                    self.handle(event).await;
                    drained += 1;
                }
                Err(_) => {
                    info!(drained, "event queue drained before shutdown");
                    return;
                }
            }
        }

        let mut discarded = 0_usize;
        while queue.receiver.try_recv().is_ok() {
            discarded += 1;
        }
        warn!(drained, discarded, "drain timeout reached, discarding remaining events");
    }

    async fn handle(&mut self, event: MemoryEvent) {
        debug!(event = event.kind(), "processing event");
        match event {
            MemoryEvent::NewContext(memory) => self.handle_new_context(memory).await,
            MemoryEvent::ThresholdReached => {
                self.run_consolidation(ConsolidationTrigger::Threshold).await;
            }
            MemoryEvent::ConversationEnd { session_id } => {
                self.run_consolidation(ConsolidationTrigger::SessionEnd(session_id)).await;
            }
            MemoryEvent::ContextInit => {}
        }
    }

    /// The per-memory pipeline: embed + store, then associate, then check
    /// the consolidation threshold. Strictly ordered within one memory.
    async fn handle_new_context(&mut self, memory: Memory) {
        let memory_id = memory.id.clone();
        let stored = match self.journal.store(memory).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(memory_id = %memory_id, "failed to store captured memory: {e}");
                return;
            }
        };

        self.tracker.analyze(&stored).await;

        self.processed_since_consolidation += 1;
        if self.processed_since_consolidation >= self.consolidation_threshold {
            self.run_consolidation(ConsolidationTrigger::Threshold).await;
        }
    }

    async fn run_consolidation(&mut self, trigger: ConsolidationTrigger) {
        self.processed_since_consolidation = 0;
        let report = self.engine.consolidate(trigger).await;
        if !report.failures.is_empty() {
            warn!(failures = report.failures.len(), "consolidation finished with failures");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Consolidation engine
//!
//! Fuses association-coherent groups of episodic memories into semantic
//! memories through the generative client. Candidates are scored and
//! partitioned into connected components over strong associations, each
//! component is split into bounded batches, and every batch makes at most
//! one generative call per invocation. A failed batch is logged, reported,
//! and never partially persisted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngramConfig;
use crate::generative::Generator;
use crate::journal::Journal;
use crate::memory::{Association, AssociationKind, Memory, MemoryKind};

/// Characters per estimated token
const CHARS_PER_TOKEN: usize = 4;

/// Estimated tokens consumed by the prompt header and footer
const PROMPT_OVERHEAD_TOKENS: usize = 200;

/// Head-room kept below the token budget
const TOKEN_SAFETY_MARGIN: usize = 128;

// ============================================================================
// TRIGGERS AND REPORT
// ============================================================================

/// What initiated a consolidation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsolidationTrigger {
    /// Explicit request through the HTTP surface
    Manual,
    /// The processor's capture counter crossed the threshold
    Threshold,
    /// A conversation ended
    SessionEnd(Option<String>),
}

impl ConsolidationTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            ConsolidationTrigger::Manual => "manual",
            ConsolidationTrigger::Threshold => "threshold",
            ConsolidationTrigger::SessionEnd(_) => "session_end",
        }
    }
}

/// Outcome of one consolidation invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidateReport {
    pub candidates_examined: usize,
    pub groups_formed: usize,
    pub batches_attempted: usize,
    pub batches_consolidated: usize,
    pub memories_created: usize,
    pub failures: Vec<String>,
    pub duration_ms: u64,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Bounded-batch LLM consolidation (C7)
///
/// Invocations serialize behind one lock; batches within an invocation run
/// sequentially to bound generative-model pressure.
pub struct ConsolidationEngine {
    journal: Arc<Journal>,
    generator: Arc<dyn Generator>,
    config: Arc<EngramConfig>,
    lock: tokio::sync::Mutex<()>,
}

impl ConsolidationEngine {
    /// Create an engine over the journal and generative client
    pub fn new(
        journal: Arc<Journal>,
        generator: Arc<dyn Generator>,
        config: Arc<EngramConfig>,
    ) -> Self {
        Self {
            journal,
            generator,
            config,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one consolidation pass. Infallible from the caller's view:
    /// upstream failures land in `report.failures`.
    pub async fn consolidate(&self, trigger: ConsolidationTrigger) -> ConsolidateReport {
        self.consolidate_with_batch_size(trigger, None).await
    }

    /// Consolidate with an optional one-off batch-size override (diagnostic
    /// surface). The override is clamped to the hard cap.
    pub async fn consolidate_with_batch_size(
        &self,
        trigger: ConsolidationTrigger,
        batch_size: Option<usize>,
    ) -> ConsolidateReport {
        let max_batch_size = batch_size
            .map(|size| size.clamp(2, crate::config::BATCH_SIZE_HARD_CAP))
            .unwrap_or(self.config.max_batch_size);
        let _guard = self.lock.lock().await;
        let started = Instant::now();
        let mut report = ConsolidateReport::default();

        info!(trigger = trigger.as_str(), "consolidation started");

        let candidates = match self.fetch_scored_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("consolidation candidate fetch failed: {e}");
                report.failures.push(format!("candidate fetch failed: {e}"));
                report.duration_ms = started.elapsed().as_millis() as u64;
                return report;
            }
        };
        report.candidates_examined = candidates.len();

        let groups = match self.group_candidates(&candidates).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!("consolidation grouping failed: {e}");
                report.failures.push(format!("grouping failed: {e}"));
                report.duration_ms = started.elapsed().as_millis() as u64;
                return report;
            }
        };
        report.groups_formed = groups.len();

        for group in groups {
            for batch in split_into_batches(group, max_batch_size) {
                let Some(batch) = fit_token_budget(batch, self.config.token_budget) else {
                    continue;
                };
                report.batches_attempted += 1;
                match self.consolidate_batch(&batch).await {
                    Ok(()) => {
                        report.batches_consolidated += 1;
                        report.memories_created += 1;
                    }
                    Err(reason) => {
                        warn!(group_size = batch.len(), "batch consolidation failed: {reason}");
                        report
                            .failures
                            .push(format!("batch of {} failed: {reason}", batch.len()));
                    }
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            candidates_examined = report.candidates_examined,
            groups_formed = report.groups_formed,
            batches_attempted = report.batches_attempted,
            batches_consolidated = report.batches_consolidated,
            memories_created = report.memories_created,
            failures = report.failures.len(),
            duration_ms = report.duration_ms,
            "consolidation complete"
        );
        report
    }

    // ========================================================================
    // CANDIDATE SELECTION AND GROUPING
    // ========================================================================

    /// Recent episodic memories, composite-scored with relevance 0 and
    /// sorted descending
    async fn fetch_scored_candidates(
        &self,
    ) -> crate::journal::Result<Vec<(Memory, f64)>> {
        let recent = self
            .journal
            .get_recent(MemoryKind::Episodic, self.config.candidate_limit)
            .await?;

        let mut scored = Vec::with_capacity(recent.len());
        for memory in recent {
            let score = self.journal.score(&memory).await?.composite;
            scored.push((memory, score));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }

    /// Connected-component partition of the candidate subgraph induced by
    /// associations with strength >= `group_threshold`. Singleton
    /// components are dropped. Each group preserves score-descending order.
    async fn group_candidates(
        &self,
        candidates: &[(Memory, f64)],
    ) -> crate::journal::Result<Vec<Vec<Memory>>> {
        let index_of: HashMap<&str, usize> = candidates
            .iter()
            .enumerate()
            .map(|(i, (memory, _))| (memory.id.as_str(), i))
            .collect();

        let mut dsu = DisjointSet::new(candidates.len());
        for (i, (memory, _)) in candidates.iter().enumerate() {
            let edges = self.journal.associations(&memory.id).await?;
            for edge in edges {
                if edge.strength < self.config.group_threshold {
                    continue;
                }
                // Edges into memories outside the candidate set (or already
                // deleted) are ignored; dangling references are expected.
                if let Some(&j) = index_of.get(edge.target_id.as_str()) {
                    dsu.union(i, j);
                }
            }
        }

        let mut components: HashMap<usize, Vec<Memory>> = HashMap::new();
        for (i, (memory, _)) in candidates.iter().enumerate() {
            components
                .entry(dsu.find(i))
                .or_default()
                .push(memory.clone());
        }

        let mut groups: Vec<Vec<Memory>> = components
            .into_values()
            .filter(|group| group.len() >= 2)
            .collect();
        // Deterministic run order: largest group first, ties by first id
        groups.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| a[0].id.cmp(&b[0].id))
        });
        Ok(groups)
    }

    // ========================================================================
    // BATCH PROCEDURE
    // ========================================================================

    /// One batch: prompt, generate, persist the semantic memory, link it to
    /// its sources, optionally delete the sources. Nothing persists on
    /// failure.
    async fn consolidate_batch(&self, batch: &[Memory]) -> Result<(), String> {
        let prompt = build_prompt(batch);
        let summary = self
            .generator
            .consolidate(&prompt)
            .await
            .map_err(|e| e.to_string())?;

        let source_ids: Vec<String> = batch.iter().map(|memory| memory.id.clone()).collect();
        let mut semantic = Memory::new(MemoryKind::Semantic, summary);
        semantic.source_ids = source_ids.clone();
        let semantic = self
            .journal
            .store(semantic)
            .await
            .map_err(|e| format!("semantic store failed: {e}"))?;

        let store = self.journal.store_backend();
        for source_id in &source_ids {
            let Some(edge) =
                Association::new(&semantic.id, source_id, AssociationKind::Semantic, 1.0)
            else {
                continue;
            };
            if let Err(e) = store.store_association(&edge).await {
                warn!(memory_id = %semantic.id, "failed to link consolidated memory: {e}");
                continue;
            }
            if let Err(e) = store.store_association(&edge.reversed()).await {
                warn!(memory_id = %semantic.id, "failed to link consolidated memory: {e}");
            }
        }

        if self.config.delete_sources_after_consolidation {
            if let Err(e) = store.delete(MemoryKind::Episodic, &source_ids).await {
                warn!(memory_id = %semantic.id, "source deletion failed: {e}");
            }
        }

        info!(
            memory_id = %semantic.id,
            sources = source_ids.len(),
            "semantic memory created"
        );
        Ok(())
    }
}

/// Split a group into near-equal batches of at most `max_batch_size`.
/// Balancing avoids a size-1 remainder batch, which could never be
/// consolidated.
fn split_into_batches(group: Vec<Memory>, max_batch_size: usize) -> Vec<Vec<Memory>> {
    if group.len() < 2 {
        return Vec::new();
    }
    let batch_count = group.len().div_ceil(max_batch_size);
    let base = group.len() / batch_count;
    let extra = group.len() % batch_count;

    let mut batches = Vec::with_capacity(batch_count);
    let mut members = group.into_iter();
    for i in 0..batch_count {
        let size = base + usize::from(i < extra);
        batches.push(members.by_ref().take(size).collect::<Vec<_>>());
    }
    // A singleton can only fall out at the smallest cap with an odd group;
    // that member just waits for the next round
    batches.retain(|batch| batch.len() >= 2);
    batches
}

/// Shrink a batch (dropping lowest-scoring members from the tail) until its
/// prompt fits the token budget. Returns `None` when fitting would leave
/// fewer than two memories.
fn fit_token_budget(mut batch: Vec<Memory>, token_budget: usize) -> Option<Vec<Memory>> {
    loop {
        let estimated = PROMPT_OVERHEAD_TOKENS
            + batch
                .iter()
                .map(|memory| memory.content.len() / CHARS_PER_TOKEN)
                .sum::<usize>();
        if estimated + TOKEN_SAFETY_MARGIN <= token_budget {
            return Some(batch);
        }
        if batch.len() <= 2 {
            warn!(estimated, budget = token_budget, "batch skipped: cannot fit token budget");
            return None;
        }
        // Members arrive score-descending, so the tail is the cheapest loss
        batch.pop();
    }
}

/// Fixed header + enumerated timestamped memories + instruction footer
fn build_prompt(batch: &[Memory]) -> String {
    let mut prompt = String::from(
        "The following are related memory entries captured from an assistant's \
         working context. Fuse them into one concise summary that preserves \
         the facts, decisions, and causal links they contain.\n\n",
    );
    for (i, memory) in batch.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. [{}] {}\n",
            i + 1,
            memory.created_at.format("%Y-%m-%d %H:%M:%S"),
            memory.content
        ));
    }
    prompt.push_str(
        "\nRespond with the summary text only, no preamble and no enumeration.",
    );
    prompt
}

// ============================================================================
// DISJOINT SET
// ============================================================================

/// Union-find over candidate indexes
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent[root_a] = root_b;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Consolidation journeys
//!
//! Seeds association-connected episodic memories and drives the engine
//! through success, batch-size-guard, and upstream-failure paths.

use std::collections::HashSet;

use engram_core::{AssociationKind, ConsolidationTrigger, MemoryKind};
use engram_e2e_tests::harness::TestSystem;
use engram_e2e_tests::mocks::GeneratorScript;

/// Seven related captures in one session; temporal edges make them a single
/// connected component at the default grouping threshold.
const SEVEN_RELATED: [&str; 7] = [
    "sprint planning covered the retry backoff design",
    "retry backoff design uses exponential delays",
    "exponential delays capped at eight seconds",
    "integration test verified retry backoff behavior",
    "retry metrics added to the dashboard",
    "dashboard alert configured for retry exhaustion",
    "retry exhaustion alert fired during load test",
];

async fn seed_connected(system: &TestSystem, contents: &[&str]) -> Vec<String> {
    let memories = system.capture_all(contents, Some("seed-session")).await;
    // The newest capture links temporally to every predecessor
    system
        .wait_for_associations(&memories.last().unwrap().id, contents.len() - 1)
        .await;
    memories.into_iter().map(|memory| memory.id).collect()
}

#[tokio::test]
async fn seven_connected_memories_consolidate_in_two_batches() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    let seeded: HashSet<String> = seed_connected(&system, &SEVEN_RELATED).await.into_iter().collect();

    let report = system.engine.consolidate(ConsolidationTrigger::Manual).await;

    assert_eq!(report.candidates_examined, 7);
    assert_eq!(report.groups_formed, 1);
    assert_eq!(report.batches_attempted, 2);
    assert_eq!(report.batches_consolidated, 2);
    assert_eq!(report.memories_created, 2);
    assert!(report.failures.is_empty());

    // Two semantic memories whose sources partition the seven inputs
    let semantic = system
        .journal
        .get_recent(MemoryKind::Semantic, 10)
        .await
        .expect("semantic");
    assert_eq!(semantic.len(), 2);

    let mut union = HashSet::new();
    for memory in &semantic {
        assert!(!memory.source_ids.is_empty());
        assert!(memory.source_ids.len() <= 5);
        for source in &memory.source_ids {
            assert!(seeded.contains(source), "source id must reference a seeded memory");
            assert!(union.insert(source.clone()), "batches must not overlap");
        }
    }
    assert_eq!(union, seeded);

    system.shutdown().await;
}

#[tokio::test]
async fn batch_size_guard_limits_every_generative_call() {
    let system = TestSystem::start(GeneratorScript::Succeed, |config| {
        config.max_batch_size = 3;
    })
    .await;
    seed_connected(&system, &SEVEN_RELATED).await;

    let report = system.engine.consolidate(ConsolidationTrigger::Manual).await;

    assert_eq!(report.batches_attempted, 3);
    assert_eq!(report.batches_consolidated, 3);
    assert!(report.failures.is_empty());

    // Every prompt the generator saw carried at most three memories
    let sizes = system.generator.batch_sizes();
    assert_eq!(sizes.len(), 3);
    assert!(sizes.iter().all(|&size| (2..=3).contains(&size)));

    system.shutdown().await;
}

#[tokio::test]
async fn generative_timeout_persists_nothing() {
    let system = TestSystem::start(GeneratorScript::Timeout, |_| {}).await;
    seed_connected(&system, &SEVEN_RELATED).await;

    let report = system.engine.consolidate(ConsolidationTrigger::Manual).await;

    assert_eq!(report.memories_created, 0);
    assert_eq!(report.batches_consolidated, 0);
    assert!(!report.failures.is_empty());

    let semantic_count = system.store.count(MemoryKind::Semantic).await.expect("count");
    assert_eq!(semantic_count, 0, "no partial result may persist");

    system.shutdown().await;
}

#[tokio::test]
async fn upstream_failure_is_reported_not_raised() {
    let system = TestSystem::start(GeneratorScript::Fail, |_| {}).await;
    seed_connected(&system, &SEVEN_RELATED).await;

    let report = system.engine.consolidate(ConsolidationTrigger::Manual).await;
    assert_eq!(report.memories_created, 0);
    assert!(report.failures.iter().any(|f| f.contains("failed")));

    system.shutdown().await;
}

#[tokio::test]
async fn lone_memory_forms_no_batches() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    system.capture_all(&["an isolated thought"], None).await;

    let report = system.engine.consolidate(ConsolidationTrigger::Manual).await;
    assert_eq!(report.candidates_examined, 1);
    assert_eq!(report.groups_formed, 0);
    assert_eq!(report.batches_attempted, 0);
    assert_eq!(report.memories_created, 0);

    system.shutdown().await;
}

#[tokio::test]
async fn consolidated_memory_is_linked_to_its_sources() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    seed_connected(&system, &SEVEN_RELATED[..4]).await;

    let report = system.engine.consolidate(ConsolidationTrigger::Manual).await;
    assert_eq!(report.memories_created, 1);

    let semantic = system
        .journal
        .get_recent(MemoryKind::Semantic, 1)
        .await
        .expect("semantic")
        .remove(0);
    assert_eq!(semantic.embedding.len(), engram_e2e_tests::mocks::MOCK_DIMENSIONS);

    let edges = system
        .store
        .associations_by_source(&semantic.id)
        .await
        .expect("edges");
    for source in &semantic.source_ids {
        let edge = edges
            .iter()
            .find(|edge| edge.target_id == *source)
            .expect("link to source");
        assert_eq!(edge.kind, AssociationKind::Semantic);
        assert_eq!(edge.strength, 1.0);

        // Reverse link from the source back to the summary
        let reverse = system
            .store
            .associations_by_source(source)
            .await
            .expect("edges");
        assert!(reverse.iter().any(|edge| edge.target_id == semantic.id));
    }

    system.shutdown().await;
}

#[tokio::test]
async fn source_deletion_is_opt_in() {
    let system = TestSystem::start(GeneratorScript::Succeed, |config| {
        config.delete_sources_after_consolidation = true;
    })
    .await;
    seed_connected(&system, &SEVEN_RELATED[..4]).await;

    let report = system.engine.consolidate(ConsolidationTrigger::Manual).await;
    assert_eq!(report.memories_created, 1);

    assert_eq!(system.store.count(MemoryKind::Episodic).await.expect("count"), 0);
    assert_eq!(system.store.count(MemoryKind::Semantic).await.expect("count"), 1);

    system.shutdown().await;
}

#[tokio::test]
async fn repeated_consolidation_does_not_duplicate_summaries() {
    let system = TestSystem::start(GeneratorScript::Succeed, |config| {
        // Keep sources so the second run sees the same candidates
        config.delete_sources_after_consolidation = false;
    })
    .await;
    seed_connected(&system, &SEVEN_RELATED[..4]).await;

    let first = system.engine.consolidate(ConsolidationTrigger::Manual).await;
    assert_eq!(first.memories_created, 1);

    // The second invocation re-summarizes the same group under a fresh id;
    // it must not fail, and each batch is attempted at most once per call.
    let second = system.engine.consolidate(ConsolidationTrigger::Manual).await;
    assert_eq!(second.batches_attempted, 1);

    system.shutdown().await;
}

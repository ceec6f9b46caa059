//! Queue overflow durability
//!
//! The producer never blocks: a full queue drops the capture, counts it,
//! and the synchronous path still succeeds. Whatever was accepted is
//! eventually stored.

use engram_core::MemoryKind;
use engram_e2e_tests::harness::TestSystem;
use engram_e2e_tests::mocks::GeneratorScript;

#[tokio::test]
async fn burst_beyond_capacity_drops_and_counts() {
    const CAPACITY: usize = 16;
    const BURST: usize = CAPACITY + 50;

    // Worker deliberately not started: the whole burst races a stalled queue
    let mut system = TestSystem::build(GeneratorScript::Succeed, |config| {
        config.queue_capacity = CAPACITY;
    })
    .await;

    for i in 0..BURST {
        // The synchronous portion always succeeds
        let memory = system.capture(&format!("burst capture {i}"), Some("s6"));
        assert!(!memory.id.is_empty());
    }

    let dropped = system.handle.dropped_events();
    assert!(dropped >= 50, "at least the overflow must be dropped");
    assert_eq!(dropped as usize, BURST - CAPACITY);

    // Start the worker and let the accepted events land
    system.start_worker();
    system.wait_for_episodic(CAPACITY as u64).await;

    let stats = system.journal.stats().await.expect("stats");
    assert_eq!(stats.episodic, (BURST as u64) - dropped);

    system.shutdown().await;
}

#[tokio::test]
async fn enqueue_at_capacity_drops_exactly_one() {
    let mut system = TestSystem::build(GeneratorScript::Succeed, |config| {
        config.queue_capacity = 2;
    })
    .await;

    system.capture("first", None);
    system.capture("second", None);
    assert_eq!(system.handle.dropped_events(), 0);

    system.capture("third", None);
    assert_eq!(system.handle.dropped_events(), 1);

    system.start_worker();
    system.wait_for_episodic(2).await;
    system.shutdown().await;
}

#[tokio::test]
async fn dropped_captures_never_reach_the_store() {
    let mut system = TestSystem::build(GeneratorScript::Succeed, |config| {
        config.queue_capacity = 4;
    })
    .await;

    let mut accepted_ids = Vec::new();
    for i in 0..8 {
        let memory = system.capture(&format!("capture {i}"), None);
        if i < 4 {
            accepted_ids.push(memory.id);
        }
    }

    system.start_worker();
    system.wait_for_episodic(4).await;

    assert_eq!(system.store.count(MemoryKind::Episodic).await.expect("count"), 4);
    for id in &accepted_ids {
        assert!(system.journal.find(id).await.is_ok(), "accepted capture must be stored");
    }

    system.shutdown().await;
}

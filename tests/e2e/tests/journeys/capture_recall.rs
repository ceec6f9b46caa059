//! Capture -> process -> recall journeys
//!
//! The capture path is asynchronous past the enqueue, so these tests poll
//! for visibility the same way a protocol bridge would.

use engram_core::{CaptureInput, MemoryKind};
use engram_e2e_tests::harness::TestSystem;
use engram_e2e_tests::mocks::{GeneratorScript, MOCK_DIMENSIONS};

#[tokio::test]
async fn capture_becomes_visible_and_searchable() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;

    let captured = system.capture("hello world", Some("s1"));
    assert!(!captured.id.is_empty());
    assert_eq!(captured.kind, MemoryKind::Episodic);

    system.wait_for_episodic(1).await;

    let recent = system
        .journal
        .get_recent(MemoryKind::Episodic, 10)
        .await
        .expect("recent");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, captured.id);
    assert_eq!(recent[0].kind, MemoryKind::Episodic);
    assert_eq!(recent[0].access_count, 0);
    assert_eq!(recent[0].embedding.len(), MOCK_DIMENSIONS);
    assert_eq!(recent[0].content, "hello world");

    // One shared word out of two: similarity well above the 0.5 bar
    let hits = system
        .journal
        .query("hello", Some(MemoryKind::Episodic), 10)
        .await
        .expect("query");
    assert_eq!(hits[0].memory.id, captured.id);
    assert!(hits[0].score.relevance_score > 0.5);

    system.shutdown().await;
}

#[tokio::test]
async fn retrieve_increments_access_count_per_call() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    let captured = system.capture("access bookkeeping check", None);
    system.wait_for_episodic(1).await;

    for expected in 1..=4_u32 {
        let fetched = system.journal.retrieve(&captured.id).await.expect("retrieve");
        assert_eq!(fetched.access_count, expected);
        assert!(fetched.created_at <= fetched.last_accessed_at);
    }

    // The touch persists
    let fetched = system.journal.find(&captured.id).await.expect("find");
    assert_eq!(fetched.access_count, 4);

    system.shutdown().await;
}

#[tokio::test]
async fn retrieve_unknown_id_is_not_found() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    let result = system.journal.retrieve("no-such-id").await;
    assert!(matches!(result, Err(engram_core::JournalError::NotFound(_))));
    system.shutdown().await;
}

#[tokio::test]
async fn capture_trims_content() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    let captured = system.capture("  padded content  ", None);
    assert_eq!(captured.content, "padded content");

    system.wait_for_episodic(1).await;
    let stored = system.journal.find(&captured.id).await.expect("find");
    assert_eq!(stored.content, "padded content");
    system.shutdown().await;
}

#[tokio::test]
async fn capture_rejects_empty_content() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    let result = system.journal.capture(CaptureInput::new("   "));
    assert!(matches!(result, Err(engram_core::JournalError::Validation(_))));
    system.shutdown().await;
}

#[tokio::test]
async fn query_on_empty_store_returns_empty_list() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    let hits = system
        .journal
        .query("anything", Some(MemoryKind::Episodic), 10)
        .await
        .expect("query");
    assert!(hits.is_empty());
    system.shutdown().await;
}

#[tokio::test]
async fn query_results_respect_limit_and_ordering() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    system
        .capture_all(
            &[
                "rust borrow checker error",
                "rust lifetime error in closure",
                "rust trait object error",
                "python indentation error",
                "grocery list for the weekend",
            ],
            None,
        )
        .await;

    let hits = system
        .journal
        .query("rust error", Some(MemoryKind::Episodic), 3)
        .await
        .expect("query");
    assert!(hits.len() <= 3);
    for pair in hits.windows(2) {
        assert!(pair[0].score.composite >= pair[1].score.composite);
    }

    system.shutdown().await;
}

#[tokio::test]
async fn stats_totals_are_consistent() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    system
        .capture_all(&["one", "two", "three"], Some("stats-session"))
        .await;

    let stats = system.journal.stats().await.expect("stats");
    assert_eq!(stats.episodic, 3);
    assert_eq!(
        stats.total,
        stats.episodic + stats.semantic + stats.procedural + stats.metacognitive
    );

    system.shutdown().await;
}

//! Association formation journeys
//!
//! Three related captures in one session must end up linked by temporal and
//! contextual edges pairwise, with semantic edges where vocabulary overlaps.

use engram_core::AssociationKind;
use engram_e2e_tests::harness::TestSystem;
use engram_e2e_tests::mocks::GeneratorScript;

/// Edge of a given kind between two specific memories
async fn has_edge(
    system: &TestSystem,
    source: &str,
    target: &str,
    kind: AssociationKind,
) -> Option<f32> {
    system
        .store
        .associations_by_source(source)
        .await
        .expect("associations")
        .into_iter()
        .find(|edge| edge.target_id == target && edge.kind == kind)
        .map(|edge| edge.strength)
}

#[tokio::test]
async fn session_captures_link_temporally_contextually_and_semantically() {
    let system = TestSystem::start(GeneratorScript::Succeed, |config| {
        config.semantic_threshold = 0.5;
    })
    .await;

    let memories = system
        .capture_all(
            &[
                "started learning goroutine channels",
                "implemented worker pool with channels",
                "debugged worker pool channels deadlock",
            ],
            Some("s2"),
        )
        .await;
    // Last capture links back to both predecessors
    system.wait_for_associations(&memories[2].id, 2).await;

    // Temporal and contextual edges among every pair, in both directions
    for (a, b) in [(0, 1), (0, 2), (1, 2)] {
        for (source, target) in [(a, b), (b, a)] {
            let temporal = has_edge(
                &system,
                &memories[source].id,
                &memories[target].id,
                AssociationKind::Temporal,
            )
            .await;
            assert!(
                temporal.is_some(),
                "missing temporal edge {source}->{target}"
            );
            assert!(temporal.unwrap() > 0.9, "captures are seconds apart");

            assert!(
                has_edge(
                    &system,
                    &memories[source].id,
                    &memories[target].id,
                    AssociationKind::Contextual,
                )
                .await
                .is_some(),
                "missing contextual edge {source}->{target}"
            );
        }
    }

    // The worker-pool captures share enough vocabulary for a semantic edge
    let semantic = has_edge(
        &system,
        &memories[2].id,
        &memories[1].id,
        AssociationKind::Semantic,
    )
    .await;
    assert!(semantic.is_some(), "missing semantic edge between worker-pool captures");
    assert!(semantic.unwrap() >= 0.5);

    system.shutdown().await;
}

#[tokio::test]
async fn every_stored_edge_has_its_reverse() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    let memories = system
        .capture_all(
            &["first entry of pair", "second entry of pair"],
            Some("mirror"),
        )
        .await;
    system.wait_for_associations(&memories[1].id, 1).await;

    for memory in &memories {
        let forward = system
            .store
            .associations_by_source(&memory.id)
            .await
            .expect("associations");
        for edge in forward {
            let reverse = has_edge(&system, &edge.target_id, &edge.source_id, edge.kind).await;
            assert_eq!(
                reverse,
                Some(edge.strength),
                "edge {} -> {} lacks a mirrored reverse",
                edge.source_id,
                edge.target_id
            );
        }
    }

    system.shutdown().await;
}

#[tokio::test]
async fn different_sessions_do_not_link_contextually() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;

    let first = system.capture_all(&["alpha session note"], Some("session-a")).await;
    let second = system.capture_all(&["beta session note"], Some("session-b")).await;
    system.wait_for_associations(&second[0].id, 1).await; // temporal edge exists

    assert!(has_edge(
        &system,
        &second[0].id,
        &first[0].id,
        AssociationKind::Contextual
    )
    .await
    .is_none());

    system.shutdown().await;
}

#[tokio::test]
async fn causal_language_links_cause_to_effect() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;

    let memories = system
        .capture_all(
            &[
                "observed connection timeouts in the payment gateway integration",
                "payment gateway connection timeouts resolved because the integration pool was exhausted",
            ],
            None,
        )
        .await;
    system.wait_for_associations(&memories[1].id, 1).await;

    // Directed cause -> effect: the older memory is the source
    let strength = has_edge(
        &system,
        &memories[0].id,
        &memories[1].id,
        AssociationKind::Causal,
    )
    .await;
    assert!(strength.is_some(), "expected causal edge from cause to effect");
    assert!(strength.unwrap() >= 0.5);

    system.shutdown().await;
}

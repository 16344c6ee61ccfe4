//! Stories about resource trees and health rollup

use flotilla_common::flux::FluxKind;
use flotilla_engine::hierarchy::NodeHealth;

use super::helpers::{register_primary, test_engine, TEST_CLUSTER};

/// Story: after a sync, every Kustomization and HelmRelease roots a tree
/// and the forest reflects the persisted records.
#[tokio::test]
#[ignore]
async fn story_tree_roots_match_synced_records() {
    let (engine, store) = test_engine();
    register_primary(&engine).await;
    engine.sync_now(TEST_CLUSTER).await.unwrap();

    use flotilla_common::store::StatusStore;
    let records = store.list_records(TEST_CLUSTER).await.unwrap();
    let root_records = records.iter().filter(|r| r.kind.is_root()).count();

    let trees = engine.resource_tree(TEST_CLUSTER).await.unwrap();
    assert_eq!(trees.len(), root_records);
}

/// Story: a fully reconciled Kustomization that applies a Deployment rolls
/// up Healthy through Deployment -> ReplicaSet -> Pod (depth 4 from the
/// root), because every level is live-looked-up and healthy.
///
/// Requires the cluster to carry at least one Ready Kustomization whose
/// inventory includes a Deployment (flux-system qualifies once Flux is
/// fully reconciled; so does the podinfo demo).
#[tokio::test]
#[ignore]
async fn story_ready_kustomization_rolls_up_healthy_to_depth_four() {
    let (engine, _store) = test_engine();
    register_primary(&engine).await;
    engine.sync_now(TEST_CLUSTER).await.unwrap();

    let trees = engine.resource_tree(TEST_CLUSTER).await.unwrap();

    let deep_healthy = trees.iter().find(|root| {
        root.kind == FluxKind::Kustomization.as_str()
            && root.health == NodeHealth::Healthy
            && root.children.iter().any(|c| {
                c.kind == "Deployment"
                    && c.children
                        .iter()
                        .any(|rs| rs.kind == "ReplicaSet" && rs.children.iter().any(|p| p.kind == "Pod"))
            })
    });

    assert!(
        deep_healthy.is_some(),
        "expected a healthy Kustomization owning Deployment -> ReplicaSet -> Pod; got: {:#?}",
        trees
    );
}

/// Story: health is derived, never stored -- two consecutive builds agree
/// with each other and with the live cluster, not with any cached tree.
#[tokio::test]
#[ignore]
async fn story_health_recomputed_per_build() {
    let (engine, _store) = test_engine();
    register_primary(&engine).await;
    engine.sync_now(TEST_CLUSTER).await.unwrap();

    let first = engine.resource_tree(TEST_CLUSTER).await.unwrap();
    let second = engine.resource_tree(TEST_CLUSTER).await.unwrap();

    let healths = |trees: &[flotilla_engine::hierarchy::ResourceNode]| {
        trees
            .iter()
            .map(|t| (t.name.clone(), t.health))
            .collect::<Vec<_>>()
    };
    assert_eq!(healths(&first), healths(&second));
}

//! Stories about cross-cluster log aggregation

use super::helpers::{register_primary, test_engine, TEST_CLUSTER};

/// Story: aggregating over one reachable and one unregistered cluster
/// returns every line from the reachable one plus a per-cluster error
/// marker for the other -- never a total failure.
#[tokio::test]
#[ignore]
async fn story_one_unreachable_cluster_yields_partial_results() {
    let (engine, _store) = test_engine();
    register_primary(&engine).await;

    let result = engine
        .aggregate_logs(
            &[TEST_CLUSTER.to_string(), "unreachable-edge".to_string()],
            "flux-system",
            Some("app=source-controller"),
            50,
        )
        .await;

    assert!(
        !result.entries.is_empty(),
        "source-controller always has log output"
    );
    assert!(result.entries.iter().all(|e| e.cluster == TEST_CLUSTER));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].cluster, "unreachable-edge");
}

/// Story: entries merge into one timestamp-ordered sequence regardless of
/// which pod produced them.
#[tokio::test]
#[ignore]
async fn story_merged_entries_are_time_ordered() {
    let (engine, _store) = test_engine();
    register_primary(&engine).await;

    let result = engine
        .aggregate_logs(&[TEST_CLUSTER.to_string()], "flux-system", None, 20)
        .await;

    let stamps: Vec<_> = result
        .entries
        .iter()
        .filter_map(|e| e.timestamp)
        .collect();
    assert!(
        stamps.windows(2).all(|w| w[0] <= w[1]),
        "entries must be ordered by timestamp"
    );
}

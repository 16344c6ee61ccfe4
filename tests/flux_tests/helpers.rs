//! Shared setup for cluster-backed tests

use std::sync::Arc;
use std::time::Duration;

use flotilla_common::store::MemoryStore;
use flotilla_engine::Engine;

/// Env var naming the kubeconfig of the test cluster
pub const KUBECONFIG_ENV: &str = "FLOTILLA_TEST_KUBECONFIG";

/// Cluster id used for the primary test cluster
pub const TEST_CLUSTER: &str = "e2e-primary";

/// Read the test kubeconfig, panicking with a usable message if unset
pub fn test_kubeconfig() -> String {
    let path = std::env::var(KUBECONFIG_ENV).unwrap_or_else(|_| {
        panic!(
            "{} must point at a kubeconfig for a Flux-enabled cluster",
            KUBECONFIG_ENV
        )
    });
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read kubeconfig {}: {}", path, e))
}

/// Build an engine over a fresh in-memory store, returning both
///
/// The store handle lets tests observe persisted records and health
/// directly, the way the database collaborator would.
pub fn test_engine() -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::builder(store.clone())
        .sync_interval(Duration::from_secs(300))
        .tree_timeout(Duration::from_secs(30))
        .log_timeout(Duration::from_secs(15))
        .build();
    (engine, store)
}

/// Register the primary test cluster, panicking on failure
pub async fn register_primary(engine: &Engine) {
    engine
        .register_cluster(TEST_CLUSTER, &test_kubeconfig(), None)
        .await
        .expect("primary test cluster must be registerable");
}

//! Trait seams toward the persistence layer
//!
//! The relational store and credential decryption live outside the engine.
//! These traits are the engine's view of them, enabling dependency
//! injection and mocking for tests. `MemoryStore` is the in-process
//! implementation used by the binary and by tests.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::record::{ClusterHealth, FluxResourceRecord, RecordKey};
use crate::Result;

/// Persistence seam for resource records and cluster health
///
/// Records are keyed by (cluster id, kind, namespace, name) and overwritten
/// last-writer-wins on each sync pass. Writes for one cluster never touch
/// another cluster's records.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait StatusStore: Send + Sync {
    /// Insert or replace one record by its composite key
    async fn upsert_record(&self, record: FluxResourceRecord) -> Result<()>;

    /// All records for one cluster
    async fn list_records(&self, cluster_id: &str) -> Result<Vec<FluxResourceRecord>>;

    /// Update a cluster's stored health
    async fn update_cluster_health(&self, cluster_id: &str, health: ClusterHealth) -> Result<()>;

    /// A cluster's stored health (`Unknown` if never recorded)
    async fn cluster_health(&self, cluster_id: &str) -> Result<ClusterHealth>;
}

/// Seam toward credential storage
///
/// Credentials arrive already decrypted; the engine never persists or logs
/// them. Encryption at rest is the collaborator's concern.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CredentialSource: Send + Sync {
    /// Decrypted kubeconfig YAML for a cluster
    async fn credential(&self, cluster_id: &str) -> Result<String>;
}

/// In-memory `StatusStore` implementation
///
/// Thread-safe via internal RwLock. Used by the binary (which has no
/// database) and by tests that need observable persistence.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordKey, FluxResourceRecord>>,
    health: RwLock<HashMap<String, ClusterHealth>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StatusStore for MemoryStore {
    async fn upsert_record(&self, record: FluxResourceRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.key(), record);
        Ok(())
    }

    async fn list_records(&self, cluster_id: &str) -> Result<Vec<FluxResourceRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.cluster_id == cluster_id)
            .cloned()
            .collect())
    }

    async fn update_cluster_health(&self, cluster_id: &str, health: ClusterHealth) -> Result<()> {
        let mut map = self.health.write().await;
        map.insert(cluster_id.to_string(), health);
        Ok(())
    }

    async fn cluster_health(&self, cluster_id: &str) -> Result<ClusterHealth> {
        let map = self.health.read().await;
        Ok(map.get(cluster_id).copied().unwrap_or(ClusterHealth::Unknown))
    }
}

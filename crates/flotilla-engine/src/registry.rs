//! Cluster client registry
//!
//! Owns one `kube::Client` per registered cluster. Handles are replaced
//! atomically: a new client is constructed and probed before it is swapped
//! in, so a failed upsert never disturbs a working client, and concurrent
//! readers observe either the old or the new handle.
//!
//! Credentials are parsed in memory and never logged.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, info};

use flotilla_common::{Error, Result};

/// Default connection timeout for cluster clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for cluster clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// A registered cluster: its id, its live client, and its sync cadence
///
/// Owned exclusively by the registry; rebuilt on credential change and
/// discarded on cluster deletion.
pub struct ClusterHandle {
    id: String,
    client: Client,
    sync_interval: Option<Duration>,
}

impl ClusterHandle {
    /// Cluster id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// A clone of the cluster's API client
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Per-cluster sync interval override, if configured
    pub fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval
    }
}

/// Process-wide map of cluster id to client handle
///
/// Explicit state with a defined lifecycle (`upsert`/`remove`), passed by
/// reference into the sync worker and request handlers so tests can build
/// isolated registries. Reads are lock-free; upserts swap atomically.
pub struct ClusterRegistry {
    clusters: DashMap<String, Arc<ClusterHandle>>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Default for ClusterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterRegistry {
    /// Create an empty registry with default client timeouts
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    /// Create an empty registry with custom client timeouts
    pub fn with_timeouts(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            clusters: DashMap::new(),
            connect_timeout,
            read_timeout,
        }
    }

    /// Register a cluster or replace its credential
    ///
    /// Parses the kubeconfig, builds a client with bounded timeouts, and
    /// probes the API server. Only after the probe succeeds is the handle
    /// swapped in; on any failure the previous handle (if any) is left
    /// untouched and still retrievable.
    pub async fn upsert(
        &self,
        cluster_id: &str,
        kubeconfig_yaml: &str,
        sync_interval: Option<Duration>,
    ) -> Result<()> {
        let client = self.build_client(cluster_id, kubeconfig_yaml).await?;

        client
            .apiserver_version()
            .await
            .map_err(|e| Error::cluster_unreachable(cluster_id, e.to_string()))?;

        let handle = Arc::new(ClusterHandle {
            id: cluster_id.to_string(),
            client,
            sync_interval,
        });
        let replaced = self.clusters.insert(cluster_id.to_string(), handle);

        if replaced.is_some() {
            info!(cluster = %cluster_id, "Replaced cluster client after credential update");
        } else {
            info!(cluster = %cluster_id, "Registered cluster");
        }
        Ok(())
    }

    /// The handle for a cluster, if registered
    pub fn get(&self, cluster_id: &str) -> Option<Arc<ClusterHandle>> {
        self.clusters.get(cluster_id).map(|e| e.value().clone())
    }

    /// Like `get`, but with a typed error for unregistered ids
    pub fn get_required(&self, cluster_id: &str) -> Result<Arc<ClusterHandle>> {
        self.get(cluster_id)
            .ok_or_else(|| Error::cluster_not_found(cluster_id))
    }

    /// Discard a cluster's handle
    pub fn remove(&self, cluster_id: &str) {
        if self.clusters.remove(cluster_id).is_some() {
            info!(cluster = %cluster_id, "Removed cluster");
        }
    }

    /// Ids of all registered clusters
    pub fn cluster_ids(&self) -> Vec<String> {
        self.clusters.iter().map(|e| e.key().clone()).collect()
    }

    /// Lightweight reachability probe against a cluster's API server
    pub async fn probe(&self, cluster_id: &str) -> Result<()> {
        let handle = self.get_required(cluster_id)?;
        handle
            .client()
            .apiserver_version()
            .await
            .map_err(|e| Error::cluster_unreachable(cluster_id, e.to_string()))?;
        debug!(cluster = %cluster_id, "Reachability probe ok");
        Ok(())
    }

    async fn build_client(&self, cluster_id: &str, kubeconfig_yaml: &str) -> Result<Client> {
        let kubeconfig = Kubeconfig::from_yaml(kubeconfig_yaml)
            .map_err(|e| Error::credential_invalid(cluster_id, e.to_string()))?;

        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| Error::credential_invalid(cluster_id, e.to_string()))?;
        config.connect_timeout = Some(self.connect_timeout);
        config.read_timeout = Some(self.read_timeout);

        Client::try_from(config).map_err(|e| Error::credential_invalid(cluster_id, e.to_string()))
    }

    /// Install a handle directly, bypassing credential parsing and probing.
    #[cfg(test)]
    pub(crate) fn install_for_test(&self, cluster_id: &str, client: Client) {
        self.clusters.insert(
            cluster_id.to_string(),
            Arc::new(ClusterHandle {
                id: cluster_id.to_string(),
                client,
                sync_interval: None,
            }),
        );
    }
}

//! Flotilla engine - multi-cluster Kubernetes resource aggregation
//!
//! Holds one live API client per registered cluster, periodically discovers
//! and normalizes Flux custom-resource state from each, reconstructs the
//! ownership hierarchy of managed workloads, and issues control-plane
//! mutations requesting actions from the Flux controllers running inside
//! each cluster.
//!
//! # Modules
//!
//! - [`registry`] - one client per cluster, atomic-swap lifecycle
//! - [`discovery`] - Flux CRD group/version resolution per cluster
//! - [`fetch`] - resource listing and normalization
//! - [`hierarchy`] - ownership trees and bottom-up health rollup
//! - [`sync`] - timer-driven orchestration with per-cluster isolation
//! - [`actions`] - reconcile/suspend/resume/scale/restart dispatch
//! - [`logs`] - cross-cluster pod log fan-out
//!
//! [`Engine`] ties these together behind the surface the API layer
//! consumes. It is constructed explicitly (no ambient globals) so tests
//! build isolated instances.

#![deny(missing_docs)]

pub mod actions;
pub mod discovery;
pub mod fetch;
pub mod hierarchy;
pub mod kube_util;
pub mod logs;
pub mod registry;
pub mod sync;

use std::sync::Arc;
use std::time::Duration;

use flotilla_common::flux::FluxKind;
use flotilla_common::record::SyncSummary;
use flotilla_common::store::{CredentialSource, StatusStore};
use flotilla_common::{Result, DEFAULT_SYNC_INTERVAL_SECS};

use actions::ActionDispatcher;
use hierarchy::{ClusterLookup, ResourceNode};
use logs::LogAggregate;
use registry::ClusterRegistry;
use sync::SyncWorker;

/// Default overall deadline for one resource tree build
pub const DEFAULT_TREE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default overall deadline for one log aggregation
pub const DEFAULT_LOG_TIMEOUT: Duration = Duration::from_secs(15);

/// The engine facade exposed to the API layer
pub struct Engine {
    registry: Arc<ClusterRegistry>,
    store: Arc<dyn StatusStore>,
    worker: Arc<SyncWorker>,
    dispatcher: ActionDispatcher,
    tree_timeout: Duration,
    log_timeout: Duration,
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    store: Arc<dyn StatusStore>,
    registry: Arc<ClusterRegistry>,
    sync_interval: Duration,
    tree_timeout: Duration,
    log_timeout: Duration,
}

impl EngineBuilder {
    /// Start a builder over a status store
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self {
            store,
            registry: Arc::new(ClusterRegistry::new()),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            tree_timeout: DEFAULT_TREE_TIMEOUT,
            log_timeout: DEFAULT_LOG_TIMEOUT,
        }
    }

    /// Use a pre-built registry (tests, custom timeouts)
    pub fn registry(mut self, registry: Arc<ClusterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Process-wide sync interval
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Overall deadline for resource tree builds
    pub fn tree_timeout(mut self, timeout: Duration) -> Self {
        self.tree_timeout = timeout;
        self
    }

    /// Overall deadline for log aggregation
    pub fn log_timeout(mut self, timeout: Duration) -> Self {
        self.log_timeout = timeout;
        self
    }

    /// Assemble the engine
    pub fn build(self) -> Engine {
        let worker = Arc::new(SyncWorker::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            self.sync_interval,
        ));
        Engine {
            dispatcher: ActionDispatcher::new(Arc::clone(&self.registry)),
            registry: self.registry,
            store: self.store,
            worker,
            tree_timeout: self.tree_timeout,
            log_timeout: self.log_timeout,
        }
    }
}

impl Engine {
    /// Start building an engine over a status store
    pub fn builder(store: Arc<dyn StatusStore>) -> EngineBuilder {
        EngineBuilder::new(store)
    }

    /// Register a cluster or update its credential
    ///
    /// The credential arrives already decrypted and is never persisted or
    /// logged here.
    pub async fn register_cluster(
        &self,
        cluster_id: &str,
        kubeconfig_yaml: &str,
        sync_interval: Option<Duration>,
    ) -> Result<()> {
        self.registry
            .upsert(cluster_id, kubeconfig_yaml, sync_interval)
            .await
    }

    /// Register a cluster using a credential pulled from the store layer
    ///
    /// The source hands back an already-decrypted kubeconfig; used when
    /// credentials live in the database rather than on disk.
    pub async fn register_from(
        &self,
        credentials: &dyn CredentialSource,
        cluster_id: &str,
        sync_interval: Option<Duration>,
    ) -> Result<()> {
        let kubeconfig = credentials.credential(cluster_id).await?;
        self.registry
            .upsert(cluster_id, &kubeconfig, sync_interval)
            .await
    }

    /// Drop a cluster's client
    pub fn remove_cluster(&self, cluster_id: &str) {
        self.registry.remove(cluster_id);
    }

    /// Run one sync pass for a cluster immediately
    pub async fn sync_now(&self, cluster_id: &str) -> Result<SyncSummary> {
        self.worker.sync_now(cluster_id).await
    }

    /// Build the resource forest for a cluster
    pub async fn resource_tree(&self, cluster_id: &str) -> Result<Vec<ResourceNode>> {
        let handle = self.registry.get_required(cluster_id)?;
        let lookup = ClusterLookup::new(handle.client());
        hierarchy::build(self.store.as_ref(), &lookup, cluster_id, self.tree_timeout).await
    }

    /// Request a reconcile of a Flux object
    pub async fn reconcile(
        &self,
        cluster_id: &str,
        kind: FluxKind,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        self.dispatcher
            .reconcile(cluster_id, kind, namespace, name)
            .await
    }

    /// Pause reconciliation of a Flux object
    pub async fn suspend(
        &self,
        cluster_id: &str,
        kind: FluxKind,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        self.dispatcher
            .suspend(cluster_id, kind, namespace, name)
            .await
    }

    /// Resume reconciliation of a Flux object
    pub async fn resume(
        &self,
        cluster_id: &str,
        kind: FluxKind,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        self.dispatcher
            .resume(cluster_id, kind, namespace, name)
            .await
    }

    /// Scale a workload
    pub async fn scale(
        &self,
        cluster_id: &str,
        workload_kind: &str,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<()> {
        self.dispatcher
            .scale(cluster_id, workload_kind, namespace, name, replicas)
            .await
    }

    /// Trigger a rolling restart of a workload
    pub async fn restart(
        &self,
        cluster_id: &str,
        workload_kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        self.dispatcher
            .restart(cluster_id, workload_kind, namespace, name)
            .await
    }

    /// Fetch and merge pod logs across clusters
    pub async fn aggregate_logs(
        &self,
        cluster_ids: &[String],
        namespace: &str,
        label_selector: Option<&str>,
        tail_lines: i64,
    ) -> LogAggregate {
        logs::aggregate(
            &self.registry,
            cluster_ids,
            namespace,
            label_selector,
            tail_lines,
            self.log_timeout,
        )
        .await
    }

    /// The timer-driven sync worker, for the host process to run
    pub fn worker(&self) -> Arc<SyncWorker> {
        Arc::clone(&self.worker)
    }

    /// The underlying cluster registry
    pub fn registry(&self) -> Arc<ClusterRegistry> {
        Arc::clone(&self.registry)
    }
}

//! Timer-driven sync orchestration
//!
//! One process-wide interval ticks the worker; each registered cluster then
//! syncs as its own spawned task. Per cluster the pass moves through
//! Idle -> Fetching -> Persisting -> Idle (Fetching -> Failed -> Idle on
//! error), and a tick skips any cluster not currently Idle, so at most one
//! sync is ever in flight per cluster while independent clusters proceed
//! concurrently.
//!
//! A reachability probe runs before each fetch. An unreachable cluster
//! skips its cycle and has its stored health flipped to unhealthy, but its
//! previously persisted records are left untouched: stale-but-available
//! beats wiped-on-outage.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use flotilla_common::record::{ClusterHealth, SyncSummary};
use flotilla_common::store::StatusStore;
use flotilla_common::{Error, Result};

use crate::fetch;
use crate::registry::ClusterRegistry;

/// Phase of a cluster's sync state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    /// No sync in flight
    Idle,
    /// Listing Flux resources from the cluster
    Fetching,
    /// Writing fetched records to the store
    Persisting,
    /// Sync errored; transitions to Idle when the pass finishes
    Failed,
}

/// Per-cluster sync phases, shared between ticks and spawned passes
#[derive(Default)]
pub struct SyncStates {
    phases: DashMap<String, SyncPhase>,
}

impl SyncStates {
    /// Claim a cluster for syncing
    ///
    /// Returns None if a sync is already in flight for this cluster id.
    /// The returned guard resets the phase to Idle when dropped, so a
    /// panicking or cancelled pass never wedges the state machine.
    pub fn try_begin(self: &Arc<Self>, cluster_id: &str) -> Option<SyncGuard> {
        match self.phases.entry(cluster_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() == SyncPhase::Idle {
                    *occupied.get_mut() = SyncPhase::Fetching;
                } else {
                    return None;
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SyncPhase::Fetching);
            }
        }
        Some(SyncGuard {
            states: Arc::clone(self),
            cluster_id: cluster_id.to_string(),
        })
    }

    /// Current phase for a cluster (`Idle` if never synced)
    pub fn phase(&self, cluster_id: &str) -> SyncPhase {
        self.phases
            .get(cluster_id)
            .map(|e| *e.value())
            .unwrap_or(SyncPhase::Idle)
    }

    fn set(&self, cluster_id: &str, phase: SyncPhase) {
        self.phases.insert(cluster_id.to_string(), phase);
    }
}

/// Exclusive claim on one cluster's sync slot
pub struct SyncGuard {
    states: Arc<SyncStates>,
    cluster_id: String,
}

impl SyncGuard {
    /// Mark the pass as persisting fetched records
    pub fn persisting(&self) {
        self.states.set(&self.cluster_id, SyncPhase::Persisting);
    }

    /// Mark the pass as failed
    pub fn failed(&self) {
        self.states.set(&self.cluster_id, SyncPhase::Failed);
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.states.set(&self.cluster_id, SyncPhase::Idle);
    }
}

/// The timer-driven orchestrator
pub struct SyncWorker {
    registry: Arc<ClusterRegistry>,
    store: Arc<dyn StatusStore>,
    interval: Duration,
    states: Arc<SyncStates>,
    last_started: DashMap<String, Instant>,
}

impl SyncWorker {
    /// Create a worker over a registry and store
    pub fn new(
        registry: Arc<ClusterRegistry>,
        store: Arc<dyn StatusStore>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            interval,
            states: Arc::new(SyncStates::default()),
            last_started: DashMap::new(),
        }
    }

    /// Sync phase for one cluster
    pub fn phase(&self, cluster_id: &str) -> SyncPhase {
        self.states.phase(cluster_id)
    }

    /// Run the tick loop until the task is dropped
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        info!(interval_secs = self.interval.as_secs(), "Sync worker started");
        loop {
            ticker.tick().await;
            self.tick();
        }
    }

    /// Start a sync pass for every idle, due cluster
    ///
    /// Clusters with a sync already in flight are skipped; clusters with a
    /// per-cluster interval override are skipped until the override has
    /// elapsed since their last pass.
    pub fn tick(self: &Arc<Self>) {
        for cluster_id in self.registry.cluster_ids() {
            if let Some(handle) = self.registry.get(&cluster_id) {
                if let Some(override_interval) = handle.sync_interval() {
                    let due = self
                        .last_started
                        .get(&cluster_id)
                        .map(|t| t.elapsed() >= override_interval)
                        .unwrap_or(true);
                    if !due {
                        continue;
                    }
                }
            }

            let Some(guard) = self.states.try_begin(&cluster_id) else {
                debug!(cluster = %cluster_id, "Sync still in flight, skipping tick");
                continue;
            };
            self.last_started.insert(cluster_id.clone(), Instant::now());

            let worker = Arc::clone(self);
            tokio::spawn(async move {
                match worker.sync_pass(&cluster_id, &guard).await {
                    Ok(summary) => {
                        info!(
                            cluster = %cluster_id,
                            records = summary.records,
                            failed_kinds = summary.failures.len(),
                            "Sync pass complete"
                        );
                    }
                    Err(e) => {
                        guard.failed();
                        warn!(cluster = %cluster_id, error = %e, "Sync pass failed");
                    }
                }
            });
        }
    }

    /// Run one sync pass immediately, bypassing the timer
    ///
    /// Refused if a pass is already in flight for this cluster.
    pub async fn sync_now(&self, cluster_id: &str) -> Result<SyncSummary> {
        let states = Arc::clone(&self.states);
        let guard = states
            .try_begin(cluster_id)
            .ok_or_else(|| Error::internal_with_context("sync", "sync already in progress"))?;

        match self.sync_pass(cluster_id, &guard).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                guard.failed();
                Err(e)
            }
        }
    }

    async fn sync_pass(&self, cluster_id: &str, guard: &SyncGuard) -> Result<SyncSummary> {
        let handle = self.registry.get_required(cluster_id)?;

        // Reachability first: an unreachable cluster skips the cycle
        // entirely and keeps its previously persisted records.
        if let Err(e) = self.registry.probe(cluster_id).await {
            self.store
                .update_cluster_health(cluster_id, ClusterHealth::Unhealthy)
                .await?;
            return Err(e);
        }

        let (records, failures) = fetch::fetch_all(&handle.client(), cluster_id).await;

        guard.persisting();
        let count = records.len();
        for record in records {
            self.store.upsert_record(record).await?;
        }
        self.store
            .update_cluster_health(cluster_id, ClusterHealth::Healthy)
            .await?;

        if !failures.is_empty() {
            warn!(
                cluster = %cluster_id,
                failed_kinds = failures.len(),
                "Partial sync: some kinds failed"
            );
        }

        Ok(SyncSummary {
            records: count,
            failures,
        })
    }
}

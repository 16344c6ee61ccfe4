//! Normalized Flux resource records and per-cluster health
//!
//! A `FluxResourceRecord` is the uniform shape every fetched Flux object is
//! reduced to before persistence. Its key includes the cluster id, so
//! records from different clusters never collide even when namespaces and
//! names do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flux::FluxKind;

/// Readiness of a Flux resource, derived from its Ready condition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceStatus {
    /// Ready condition is True
    Ready,
    /// Ready condition is False
    NotReady,
    /// No Ready condition (freshly created, not yet reconciled)
    Unknown,
}

/// Stored health of a registered cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterHealth {
    /// Last reachability probe succeeded
    Healthy,
    /// Last reachability probe failed; persisted records may be stale
    Unhealthy,
    /// Never probed
    Unknown,
}

/// Composite key of a resource record: unique across all clusters
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordKey {
    /// Owning cluster id
    pub cluster_id: String,
    /// Flux kind
    pub kind: FluxKind,
    /// Object namespace
    pub namespace: String,
    /// Object name
    pub name: String,
}

/// One Flux object, normalized for persistence and display
///
/// Last-writer-wins per key on each sync pass. Records for objects that
/// have disappeared from the live cluster are not pruned automatically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxResourceRecord {
    /// Owning cluster id
    pub cluster_id: String,
    /// Flux kind
    pub kind: FluxKind,
    /// Object namespace
    pub namespace: String,
    /// Object name
    pub name: String,
    /// Readiness derived from the Ready condition
    pub status: ResourceStatus,
    /// Human message from the Ready condition
    pub message: String,
    /// Last reconcile timestamp reported by the controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<DateTime<Utc>>,
    /// Normalized spec/status payload (per-kind shape)
    pub payload: serde_json::Value,
}

impl FluxResourceRecord {
    /// The record's composite key
    pub fn key(&self) -> RecordKey {
        RecordKey {
            cluster_id: self.cluster_id.clone(),
            kind: self.kind,
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

/// One kind that failed to fetch within an otherwise successful sync
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KindFailure {
    /// The kind that failed
    pub kind: FluxKind,
    /// The fetch error, as text
    pub message: String,
}

/// Outcome of one cluster sync pass
///
/// Per-kind failures are aggregated here rather than failing the pass;
/// sibling kinds always complete.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Number of records fetched and persisted
    pub records: usize,
    /// Kinds that failed, with their errors
    pub failures: Vec<KindFailure>,
}

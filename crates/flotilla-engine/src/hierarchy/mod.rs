//! Ownership hierarchy reconstruction and health rollup
//!
//! Rebuilds the parent->child tree of managed workloads from flat state:
//! persisted Kustomization/HelmRelease records are the roots, their applied
//! inventory names the first level of children, and Kubernetes
//! owner-reference metadata links the levels below (Deployment ->
//! ReplicaSet -> Pod). Child objects are always looked up live -- workloads
//! are not separately synced, and a cached copy would go stale.
//!
//! Traversal is arena+index rather than pointer-chasing: children resolve
//! by UID against a bounded-depth frontier, and a UID already on the
//! current path is rejected, so cycle-safety is structural rather than a
//! runtime assertion. Health is recomputed bottom-up on every build and
//! never stored.

pub mod inventory;

use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use kube::api::{Api, DynamicObject, ListParams};
use kube::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use flotilla_common::record::{FluxResourceRecord, ResourceStatus};
use flotilla_common::store::StatusStore;
use flotilla_common::Result;

use crate::kube_util::{
    build_api_resource, has_owner_uid, kind_str, metadata_str, object_to_value,
    workload_api_version,
};
use inventory::{extract_inventory, InventoryEntry};

/// Maximum owner-reference expansion depth below a root
///
/// Guarantees termination even if owner references ever form a cycle the
/// path check misses.
const MAX_OWNER_DEPTH: usize = 8;

/// Derived health of a tree node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeHealth {
    /// Node and every descendant are healthy
    Healthy,
    /// Some descendant is still progressing, none degraded
    Progressing,
    /// Node or some descendant is degraded
    Degraded,
    /// No status information and no children, or an unreadable descendant
    Unknown,
}

/// One node in a cluster's resource tree
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    /// Object kind
    pub kind: String,
    /// Object namespace (empty for cluster-scoped)
    pub namespace: String,
    /// Object name
    pub name: String,
    /// Derived health, recomputed on every build
    pub health: NodeHealth,
    /// Condition or lookup-failure message, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Owned children
    pub children: Vec<ResourceNode>,
}

/// Live-cluster lookups the builder performs
///
/// A seam so the traversal logic is testable without a cluster.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LiveLookup: Send + Sync {
    /// Fetch one inventory entry's live object; None if it no longer exists
    async fn get(&self, entry: &InventoryEntry) -> Result<Option<Value>>;

    /// List live objects of `child_kind` in a namespace owned by `owner_uid`
    async fn list_owned(
        &self,
        child_kind: &str,
        namespace: &str,
        owner_uid: &str,
    ) -> Result<Vec<Value>>;

    /// Recover a HelmRelease inventory from Helm storage
    async fn helm_inventory(
        &self,
        payload: &Value,
        name: &str,
        namespace: &str,
    ) -> Result<Vec<InventoryEntry>>;
}

/// `LiveLookup` backed by a cluster's API client
pub struct ClusterLookup {
    client: Client,
}

impl ClusterLookup {
    /// Wrap a cluster client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl LiveLookup for ClusterLookup {
    async fn get(&self, entry: &InventoryEntry) -> Result<Option<Value>> {
        let ar = build_api_resource(&entry.api_version(), &entry.kind);
        let api: Api<DynamicObject> = if entry.namespace.is_empty() {
            Api::all_with(self.client.clone(), &ar)
        } else {
            Api::namespaced_with(self.client.clone(), &entry.namespace, &ar)
        };
        let obj = api.get_opt(&entry.name).await?;
        Ok(obj.and_then(|o| object_to_value(&o, &ar.api_version, &ar.kind)))
    }

    async fn list_owned(
        &self,
        child_kind: &str,
        namespace: &str,
        owner_uid: &str,
    ) -> Result<Vec<Value>> {
        let Some(api_version) = workload_api_version(child_kind) else {
            return Ok(Vec::new());
        };
        let ar = build_api_resource(api_version, child_kind);
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .iter()
            .filter_map(|o| object_to_value(o, &ar.api_version, &ar.kind))
            .filter(|v| has_owner_uid(v, owner_uid))
            .collect())
    }

    async fn helm_inventory(
        &self,
        payload: &Value,
        name: &str,
        namespace: &str,
    ) -> Result<Vec<InventoryEntry>> {
        inventory::helm_storage_inventory(&self.client, payload, name, namespace).await
    }
}

/// Build the resource forest for one cluster
///
/// Roots are persisted Kustomization/HelmRelease records; roots build
/// concurrently under one overall deadline. A root that cannot finish in
/// time is returned with health `Unknown` and a timeout message -- partial
/// results are preferred over blocking the caller.
pub async fn build(
    store: &dyn StatusStore,
    lookup: &dyn LiveLookup,
    cluster_id: &str,
    deadline: Duration,
) -> Result<Vec<ResourceNode>> {
    let records = store.list_records(cluster_id).await?;
    let mut roots: Vec<&FluxResourceRecord> =
        records.iter().filter(|r| r.kind.is_root()).collect();
    roots.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

    debug!(cluster = %cluster_id, roots = roots.len(), "Building resource tree");

    let deadline = Instant::now() + deadline;
    let nodes = join_all(roots.into_iter().map(|record| async move {
        match timeout_at(deadline, build_root(lookup, record)).await {
            Ok(node) => node,
            Err(_) => {
                warn!(
                    cluster = %record.cluster_id,
                    root = %record.name,
                    "Hierarchy build timed out for root"
                );
                ResourceNode {
                    kind: record.kind.as_str().to_string(),
                    namespace: record.namespace.clone(),
                    name: record.name.clone(),
                    health: NodeHealth::Unknown,
                    message: Some("hierarchy build timed out".to_string()),
                    children: Vec::new(),
                }
            }
        }
    }))
    .await;

    Ok(nodes)
}

async fn build_root(lookup: &dyn LiveLookup, record: &FluxResourceRecord) -> ResourceNode {
    let own = match record.status {
        ResourceStatus::Ready => NodeHealth::Healthy,
        ResourceStatus::NotReady => NodeHealth::Degraded,
        ResourceStatus::Unknown => NodeHealth::Unknown,
    };

    let mut entries = extract_inventory(&record.payload);
    if entries.is_empty() && record.kind == flotilla_common::flux::FluxKind::HelmRelease {
        match lookup
            .helm_inventory(&record.payload, &record.name, &record.namespace)
            .await
        {
            Ok(recovered) => entries = recovered,
            Err(e) => {
                debug!(release = %record.name, error = %e, "No recoverable Helm inventory");
            }
        }
    }

    let mut children = Vec::new();
    for entry in entries {
        match lookup.get(&entry).await {
            Ok(Some(obj)) => {
                let mut path = Vec::new();
                children.push(expand_live(lookup, obj, 1, &mut path).await);
            }
            Ok(None) => {
                // Deleted or not yet applied: visible, not omitted
                children.push(placeholder(
                    &entry,
                    "not found in live cluster (deleted or not yet applied)",
                ));
            }
            Err(e) => {
                children.push(placeholder(&entry, &format!("live lookup failed: {}", e)));
            }
        }
    }

    let health = rollup(own, &children);
    ResourceNode {
        kind: record.kind.as_str().to_string(),
        namespace: record.namespace.clone(),
        name: record.name.clone(),
        health,
        message: (!record.message.is_empty()).then(|| record.message.clone()),
        children,
    }
}

fn placeholder(entry: &InventoryEntry, message: &str) -> ResourceNode {
    ResourceNode {
        kind: entry.kind.clone(),
        namespace: entry.namespace.clone(),
        name: entry.name.clone(),
        health: NodeHealth::Unknown,
        message: Some(message.to_string()),
        children: Vec::new(),
    }
}

/// Build a node for a live object, expanding owned children
///
/// `path` holds the UIDs of every ancestor in the current descent; a child
/// whose UID is already on the path is a cycle and is skipped. Boxed
/// because the traversal recurses.
fn expand_live<'a>(
    lookup: &'a dyn LiveLookup,
    obj: Value,
    depth: usize,
    path: &'a mut Vec<String>,
) -> BoxFuture<'a, ResourceNode> {
    Box::pin(async move {
        let kind = kind_str(&obj).unwrap_or("Unknown").to_string();
        let namespace = metadata_str(&obj, "namespace").unwrap_or_default().to_string();
        let name = metadata_str(&obj, "name").unwrap_or_default().to_string();
        let uid = metadata_str(&obj, "uid").map(str::to_string);
        let (own, mut message) = live_health(&kind, &obj);

        let mut children = Vec::new();
        if depth < MAX_OWNER_DEPTH {
            if let Some(uid) = uid.filter(|u| !path.contains(u)) {
                path.push(uid.clone());
                for child_kind in owned_child_kinds(&kind) {
                    match lookup.list_owned(child_kind, &namespace, &uid).await {
                        Ok(owned) => {
                            for child in owned {
                                if let Some(child_uid) = metadata_str(&child, "uid") {
                                    if path.iter().any(|p| p == child_uid) {
                                        warn!(
                                            kind = %child_kind,
                                            uid = %child_uid,
                                            "Owner-reference cycle detected, skipping revisit"
                                        );
                                        continue;
                                    }
                                }
                                children.push(expand_live(lookup, child, depth + 1, path).await);
                            }
                        }
                        Err(e) => {
                            // Expansion failure is annotated on the parent so
                            // the gap is visible to the operator
                            message.get_or_insert_with(|| {
                                format!("failed to list owned {}: {}", child_kind, e)
                            });
                        }
                    }
                }
                path.pop();
            }
        }

        let health = rollup(own, &children);
        ResourceNode {
            kind,
            namespace,
            name,
            health,
            message,
            children,
        }
    })
}

/// Child kinds reachable by owner reference from a given kind
fn owned_child_kinds(kind: &str) -> &'static [&'static str] {
    match kind {
        "Deployment" => &["ReplicaSet"],
        "ReplicaSet" | "StatefulSet" | "DaemonSet" => &["Pod"],
        "CronJob" => &["Job"],
        "Job" => &["Pod"],
        _ => &[],
    }
}

/// Combine a node's own health with its (already rolled-up) children
///
/// Degraded dominates; Progressing next; Healthy only when every child is
/// Healthy and the node itself is not worse; anything mixed with Unknown
/// stays Unknown.
fn rollup(own: NodeHealth, children: &[ResourceNode]) -> NodeHealth {
    if children.is_empty() {
        return own;
    }
    if own == NodeHealth::Degraded || children.iter().any(|c| c.health == NodeHealth::Degraded) {
        return NodeHealth::Degraded;
    }
    if own == NodeHealth::Progressing
        || children.iter().any(|c| c.health == NodeHealth::Progressing)
    {
        return NodeHealth::Progressing;
    }
    if children.iter().all(|c| c.health == NodeHealth::Healthy) {
        return NodeHealth::Healthy;
    }
    NodeHealth::Unknown
}

/// Health of one live object, by kind
///
/// Workload kinds compare desired vs ready counts; everything else falls
/// back to the Ready condition when present.
fn live_health(kind: &str, obj: &Value) -> (NodeHealth, Option<String>) {
    let status = obj.get("status");

    match kind {
        "Deployment" | "StatefulSet" | "ReplicaSet" => {
            let desired = obj
                .get("spec")
                .and_then(|s| s.get("replicas"))
                .and_then(|r| r.as_i64())
                .unwrap_or(1);
            let ready = status
                .and_then(|s| s.get("readyReplicas"))
                .and_then(|r| r.as_i64())
                .unwrap_or(0);
            let message = Some(format!("Replicas: {}/{}", ready, desired));
            if ready == desired {
                (NodeHealth::Healthy, message)
            } else {
                (NodeHealth::Progressing, message)
            }
        }
        "DaemonSet" => {
            let desired = status
                .and_then(|s| s.get("desiredNumberScheduled"))
                .and_then(|r| r.as_i64())
                .unwrap_or(0);
            let ready = status
                .and_then(|s| s.get("numberReady"))
                .and_then(|r| r.as_i64())
                .unwrap_or(0);
            let message = Some(format!("Ready: {}/{}", ready, desired));
            if ready == desired {
                (NodeHealth::Healthy, message)
            } else {
                (NodeHealth::Progressing, message)
            }
        }
        "Pod" => {
            let phase = status
                .and_then(|s| s.get("phase"))
                .and_then(|p| p.as_str())
                .unwrap_or("");
            let message = (!phase.is_empty()).then(|| phase.to_string());
            match phase {
                "Running" | "Succeeded" => (NodeHealth::Healthy, message),
                "Pending" => (NodeHealth::Progressing, message),
                "Failed" => (NodeHealth::Degraded, message),
                _ => (NodeHealth::Unknown, message),
            }
        }
        "Job" => {
            let succeeded = status
                .and_then(|s| s.get("succeeded"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            let failed = status
                .and_then(|s| s.get("failed"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            if failed > 0 {
                (NodeHealth::Degraded, Some(format!("Failed: {}", failed)))
            } else if succeeded > 0 {
                (NodeHealth::Healthy, Some(format!("Succeeded: {}", succeeded)))
            } else {
                (NodeHealth::Progressing, None)
            }
        }
        _ => {
            let ready = status
                .and_then(|s| s.get("conditions"))
                .and_then(|c| c.as_array())
                .and_then(|conds| {
                    conds
                        .iter()
                        .find(|c| c.get("type").and_then(|t| t.as_str()) == Some("Ready"))
                });
            match ready {
                Some(cond) => {
                    let message = cond
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string);
                    match cond.get("status").and_then(|s| s.as_str()) {
                        Some("True") => (NodeHealth::Healthy, message),
                        Some("False") => (NodeHealth::Degraded, message),
                        _ => (NodeHealth::Unknown, message),
                    }
                }
                None => (NodeHealth::Unknown, None),
            }
        }
    }
}

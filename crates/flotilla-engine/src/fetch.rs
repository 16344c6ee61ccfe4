//! Resource fetching and normalization
//!
//! Lists every object of each resolved Flux kind across all namespaces and
//! reduces it to a `FluxResourceRecord`: Ready condition, message,
//! last-reconcile time, and a per-kind normalized payload. Objects with no
//! status block (freshly created, not yet reconciled) map to `Unknown`
//! rather than failing the listing.
//!
//! One kind failing never aborts the others: failures are isolated per kind
//! and aggregated for the sync summary.

use chrono::{DateTime, Utc};
use kube::api::{Api, DynamicObject, ListParams};
use kube::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use flotilla_common::flux::FluxKind;
use flotilla_common::record::{FluxResourceRecord, KindFailure, ResourceStatus};
use flotilla_common::{Error, Result};

use crate::discovery;

const CONDITION_READY: &str = "Ready";

/// Fetch and normalize all objects of one Flux kind from a cluster
pub async fn fetch_kind(
    client: &Client,
    cluster_id: &str,
    kind: FluxKind,
) -> Result<Vec<FluxResourceRecord>> {
    let ar = discovery::resolve(client, cluster_id, kind).await?;
    let api: Api<DynamicObject> = Api::all_with(client.clone(), &ar);
    let list = api.list(&ListParams::default()).await?;

    Ok(list
        .items
        .iter()
        .filter_map(|obj| normalize(cluster_id, kind, obj))
        .collect())
}

/// Fetch all supported kinds from a cluster, isolating per-kind failures
///
/// `UnsupportedKind` (no Flux CRD served) contributes an empty result, not
/// a failure. Anything else is recorded and the remaining kinds proceed.
pub async fn fetch_all(
    client: &Client,
    cluster_id: &str,
) -> (Vec<FluxResourceRecord>, Vec<KindFailure>) {
    let mut records = Vec::new();
    let mut failures = Vec::new();

    for kind in FluxKind::ALL {
        match fetch_kind(client, cluster_id, kind).await {
            Ok(mut batch) => {
                debug!(cluster = %cluster_id, kind = %kind, count = batch.len(), "Fetched kind");
                records.append(&mut batch);
            }
            Err(Error::UnsupportedKind { .. }) => {
                debug!(cluster = %cluster_id, kind = %kind, "Kind not served, skipping");
            }
            Err(e) => {
                warn!(cluster = %cluster_id, kind = %kind, error = %e, "Failed to fetch kind");
                failures.push(KindFailure {
                    kind,
                    message: e.to_string(),
                });
            }
        }
    }

    (records, failures)
}

/// Reduce one live object to a record; None if it has no name
pub fn normalize(cluster_id: &str, kind: FluxKind, obj: &DynamicObject) -> Option<FluxResourceRecord> {
    let name = obj.metadata.name.clone()?;
    let namespace = obj.metadata.namespace.clone().unwrap_or_default();
    let status = obj.data.get("status");

    let (ready, message) = ready_condition(status);

    Some(FluxResourceRecord {
        cluster_id: cluster_id.to_string(),
        kind,
        namespace,
        name,
        status: ready,
        message,
        last_reconciled: last_reconciled(status),
        payload: normalize_payload(kind, obj),
    })
}

/// Map the Ready condition to a status enum plus its message
///
/// True -> Ready, False -> NotReady, condition or status absent -> Unknown.
fn ready_condition(status: Option<&Value>) -> (ResourceStatus, String) {
    let ready = status
        .and_then(|s| s.get("conditions"))
        .and_then(|c| c.as_array())
        .and_then(|conds| {
            conds
                .iter()
                .find(|c| c.get("type").and_then(|t| t.as_str()) == Some(CONDITION_READY))
        });

    match ready {
        Some(cond) => {
            let message = cond
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_string();
            match cond.get("status").and_then(|s| s.as_str()) {
                Some("True") => (ResourceStatus::Ready, message),
                Some("False") => (ResourceStatus::NotReady, message),
                _ => (ResourceStatus::Unknown, message),
            }
        }
        None => (ResourceStatus::Unknown, String::new()),
    }
}

/// Last reconcile time: `status.lastHandledReconcileAt`, falling back to the
/// Ready condition's transition time
fn last_reconciled(status: Option<&Value>) -> Option<DateTime<Utc>> {
    let status = status?;

    let stamp = status
        .get("lastHandledReconcileAt")
        .and_then(|t| t.as_str())
        .or_else(|| {
            status
                .get("conditions")
                .and_then(|c| c.as_array())
                .and_then(|conds| {
                    conds
                        .iter()
                        .find(|c| c.get("type").and_then(|t| t.as_str()) == Some(CONDITION_READY))
                })
                .and_then(|c| c.get("lastTransitionTime"))
                .and_then(|t| t.as_str())
        })?;

    DateTime::parse_from_rfc3339(stamp)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Per-kind payload normalization: pruned spec plus verbatim status
///
/// Dispatch over the closed kind set; each variant keeps the spec fields
/// the hierarchy builder and UI consume. Status is kept whole because it
/// carries the inventory and Helm release history.
fn normalize_payload(kind: FluxKind, obj: &DynamicObject) -> Value {
    let spec = obj.data.get("spec");
    let status = obj.data.get("status").cloned().unwrap_or(Value::Null);

    let pruned_spec = match kind {
        FluxKind::Kustomization => prune(spec, &["path", "sourceRef", "suspend", "interval", "prune"]),
        FluxKind::HelmRelease => prune(spec, &["chart", "chartRef", "suspend", "interval", "kubeConfig"]),
        FluxKind::GitRepository => prune(spec, &["url", "ref", "suspend", "interval"]),
        FluxKind::HelmRepository => prune(spec, &["url", "type", "suspend", "interval"]),
    };

    json!({ "spec": pruned_spec, "status": status })
}

fn prune(spec: Option<&Value>, fields: &[&str]) -> Value {
    let mut out = serde_json::Map::new();
    if let Some(Value::Object(map)) = spec {
        for field in fields {
            if let Some(v) = map.get(*field) {
                out.insert((*field).to_string(), v.clone());
            }
        }
    }
    Value::Object(out)
}

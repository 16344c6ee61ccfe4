//! Control action dispatch
//!
//! Every action is a single merge PATCH against one object in one cluster.
//! Reconcile bumps the `reconcile.fluxcd.io/requestedAt` annotation -- a
//! one-way signal the in-cluster controller observes on its own schedule;
//! the dispatcher never waits for or verifies the controller's response.
//! Suspend/resume toggle `spec.suspend`; scale and restart patch workload
//! objects directly.
//!
//! API errors (not found, forbidden, conflict) are returned verbatim so the
//! operator can correct RBAC or naming. No retry happens here: all actions
//! are idempotent and safe for the caller to resubmit.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use serde_json::{json, Value};
use tracing::info;

use flotilla_common::flux::FluxKind;
use flotilla_common::{
    Error, Result, RECONCILE_REQUEST_ANNOTATION, RESTARTED_AT_ANNOTATION,
};

use crate::discovery;
use crate::kube_util::{build_api_resource, workload_api_version};
use crate::registry::ClusterRegistry;

// =============================================================================
// Patch bodies (pure, unit-testable)
// =============================================================================

/// Annotation bump requesting a reconcile at `now`
pub fn reconcile_patch(now: DateTime<Utc>) -> Value {
    json!({
        "metadata": {
            "annotations": {
                RECONCILE_REQUEST_ANNOTATION: now.to_rfc3339_opts(SecondsFormat::Secs, true)
            }
        }
    })
}

/// Set or clear `spec.suspend`
pub fn suspend_patch(suspend: bool) -> Value {
    json!({"spec": {"suspend": suspend}})
}

/// Set the desired replica count
pub fn scale_patch(replicas: i32) -> Value {
    json!({"spec": {"replicas": replicas}})
}

/// Pod-template annotation bump triggering a rolling restart
pub fn restart_patch(now: DateTime<Utc>) -> Value {
    json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": {
                        RESTARTED_AT_ANNOTATION: now.to_rfc3339_opts(SecondsFormat::Secs, true)
                    }
                }
            }
        }
    })
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Issues control actions through the cluster registry
pub struct ActionDispatcher {
    registry: Arc<ClusterRegistry>,
}

impl ActionDispatcher {
    /// Create a dispatcher over a registry
    pub fn new(registry: Arc<ClusterRegistry>) -> Self {
        Self { registry }
    }

    /// Request a reconcile of a Flux object (fire-and-forget)
    pub async fn reconcile(
        &self,
        cluster_id: &str,
        kind: FluxKind,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        self.patch_flux(cluster_id, kind, namespace, name, reconcile_patch(Utc::now()))
            .await?;
        info!(cluster = %cluster_id, kind = %kind, namespace, name, "Requested reconcile");
        Ok(())
    }

    /// Pause reconciliation of a Flux object
    pub async fn suspend(
        &self,
        cluster_id: &str,
        kind: FluxKind,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        self.patch_flux(cluster_id, kind, namespace, name, suspend_patch(true))
            .await?;
        info!(cluster = %cluster_id, kind = %kind, namespace, name, "Suspended");
        Ok(())
    }

    /// Resume reconciliation of a Flux object
    pub async fn resume(
        &self,
        cluster_id: &str,
        kind: FluxKind,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        self.patch_flux(cluster_id, kind, namespace, name, suspend_patch(false))
            .await?;
        info!(cluster = %cluster_id, kind = %kind, namespace, name, "Resumed");
        Ok(())
    }

    /// Scale a workload to the given replica count
    pub async fn scale(
        &self,
        cluster_id: &str,
        workload_kind: &str,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<()> {
        self.patch_workload(cluster_id, workload_kind, namespace, name, scale_patch(replicas))
            .await?;
        info!(cluster = %cluster_id, kind = %workload_kind, namespace, name, replicas, "Scaled");
        Ok(())
    }

    /// Trigger a rolling restart of a workload
    pub async fn restart(
        &self,
        cluster_id: &str,
        workload_kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        self.patch_workload(
            cluster_id,
            workload_kind,
            namespace,
            name,
            restart_patch(Utc::now()),
        )
        .await?;
        info!(cluster = %cluster_id, kind = %workload_kind, namespace, name, "Requested restart");
        Ok(())
    }

    async fn patch_flux(
        &self,
        cluster_id: &str,
        kind: FluxKind,
        namespace: &str,
        name: &str,
        body: Value,
    ) -> Result<()> {
        let handle = self.registry.get_required(cluster_id)?;
        let client = handle.client();
        let ar = discovery::resolve(&client, cluster_id, kind).await?;
        let api: Api<DynamicObject> = Api::namespaced_with(client, namespace, &ar);
        api.patch(name, &PatchParams::default(), &Patch::Merge(&body))
            .await?;
        Ok(())
    }

    async fn patch_workload(
        &self,
        cluster_id: &str,
        workload_kind: &str,
        namespace: &str,
        name: &str,
        body: Value,
    ) -> Result<()> {
        let api_version = workload_api_version(workload_kind).ok_or_else(|| {
            Error::internal_with_context(
                "actions",
                format!("{} is not a patchable workload kind", workload_kind),
            )
        })?;
        let handle = self.registry.get_required(cluster_id)?;
        let ar = build_api_resource(api_version, workload_kind);
        let api: Api<DynamicObject> = Api::namespaced_with(handle.client(), namespace, &ar);
        api.patch(name, &PatchParams::default(), &Patch::Merge(&body))
            .await?;
        Ok(())
    }
}

//! Flux CRD discovery
//!
//! The apiVersion serving each Flux kind varies across Flux releases, so
//! nothing is hardcoded: each kind carries an ordered newest-first candidate
//! list, and we probe the cluster's API group for the first candidate it
//! actually serves. A cluster without Flux installed yields
//! `UnsupportedKind`, which callers treat as an empty result, not a failure.

use kube::discovery::{ApiResource, Discovery};
use kube::Client;
use tracing::{debug, trace};

use flotilla_common::flux::FluxKind;
use flotilla_common::{Error, Result};

/// Resolve the served ApiResource for a Flux kind on one cluster
///
/// Probes the kind's API group and returns the first candidate version the
/// server serves. `UnsupportedKind` if the group is absent or none of the
/// candidates are served.
pub async fn resolve(client: &Client, cluster_id: &str, kind: FluxKind) -> Result<ApiResource> {
    let discovery = Discovery::new(client.clone())
        .filter(&[kind.group()])
        .run()
        .await?;

    for api_group in discovery.groups() {
        if api_group.name() != kind.group() {
            continue;
        }

        // Newest first: a cluster serving both v1 and v1beta2 resolves to v1.
        for version in kind.candidate_versions() {
            for (ar, _caps) in api_group.versioned_resources(version) {
                if ar.kind == kind.as_str() {
                    debug!(
                        cluster = %cluster_id,
                        kind = %kind,
                        api_version = %ar.api_version,
                        "Resolved Flux kind"
                    );
                    return Ok(ar);
                }
            }
            trace!(cluster = %cluster_id, kind = %kind, version, "Candidate version not served");
        }
    }

    Err(Error::unsupported_kind(cluster_id, kind.as_str()))
}

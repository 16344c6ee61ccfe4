//! Applied-inventory extraction
//!
//! Flux records every object a Kustomization applies in
//! `status.inventory.entries`, each entry an id of the form
//! `<namespace>_<name>_<group>_<kind>` plus a version. HelmReleases on
//! newer Flux versions populate the same field; older ones require
//! recovering the manifest from the Helm storage Secret
//! (`sh.helm.release.v1.<release>.v<version>`): base64, optionally gzip,
//! JSON, multi-document YAML.
//!
//! Entries are derived on every hierarchy request and never persisted;
//! they are cheap to recompute and would otherwise go stale against the
//! live cluster.

use std::io::Read;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Client;
use serde_json::Value;
use tracing::{debug, warn};

use flotilla_common::{Error, Result};

use crate::kube_util::parse_api_version;

/// One object reference recovered from an applied inventory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryEntry {
    /// API group (empty for the core group)
    pub group: String,
    /// API version
    pub version: String,
    /// Object kind
    pub kind: String,
    /// Namespace (empty for cluster-scoped objects)
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl InventoryEntry {
    /// Parse a Flux inventory id (`<namespace>_<name>_<group>_<kind>`)
    pub fn parse(id: &str, version: &str) -> Option<Self> {
        let parts: Vec<&str> = id.splitn(4, '_').collect();
        if parts.len() != 4 {
            return None;
        }
        let (namespace, name, group, kind) = (parts[0], parts[1], parts[2], parts[3]);
        if name.is_empty() || kind.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Full apiVersion string ("apps/v1", or "v1" for the core group)
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// Read `status.inventory.entries` out of a record payload
///
/// Malformed entries are skipped, not fatal: one bad id must not hide the
/// rest of the inventory.
pub fn extract_inventory(payload: &Value) -> Vec<InventoryEntry> {
    let entries = payload
        .get("status")
        .and_then(|s| s.get("inventory"))
        .and_then(|i| i.get("entries"))
        .and_then(|e| e.as_array());

    let Some(entries) = entries else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id").and_then(|i| i.as_str())?;
            let version = entry.get("v").and_then(|v| v.as_str())?;
            let parsed = InventoryEntry::parse(id, version);
            if parsed.is_none() {
                warn!(id, "Skipping malformed inventory entry");
            }
            parsed
        })
        .collect()
}

/// Recover a HelmRelease's inventory from its Helm storage Secret
///
/// Used when `status.inventory` is absent. Releases targeting a remote
/// cluster (`spec.kubeConfig` set) are skipped; their storage lives
/// elsewhere.
pub async fn helm_storage_inventory(
    client: &Client,
    payload: &Value,
    release_name_fallback: &str,
    hr_namespace: &str,
) -> Result<Vec<InventoryEntry>> {
    let spec = payload.get("spec").unwrap_or(&Value::Null);
    if spec.get("kubeConfig").is_some() {
        debug!("HelmRelease targets a remote cluster, skipping storage inventory");
        return Ok(Vec::new());
    }

    let status = payload
        .get("status")
        .ok_or_else(|| Error::serialization_for_kind("HelmRelease", "missing status"))?;

    let storage_namespace = status
        .get("storageNamespace")
        .and_then(|s| s.as_str())
        .unwrap_or(hr_namespace);

    let history = status
        .get("history")
        .and_then(|h| h.as_array())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::serialization_for_kind("HelmRelease", "no release history"))?;

    let latest = &history[0];
    let release_name = latest
        .get("name")
        .and_then(|n| n.as_str())
        .unwrap_or(release_name_fallback);
    let release_version = latest
        .get("version")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::serialization_for_kind("HelmRelease", "history entry missing version"))?;
    let release_namespace = latest
        .get("namespace")
        .and_then(|n| n.as_str())
        .unwrap_or(hr_namespace);

    // Secret name format fixed by Helm's storage driver
    let secret_name = format!("sh.helm.release.v1.{}.v{}", release_name, release_version);
    let secrets: Api<Secret> = Api::namespaced(client.clone(), storage_namespace);
    let secret = secrets.get(&secret_name).await?;

    let blob = secret
        .data
        .as_ref()
        .and_then(|data| data.get("release"))
        .ok_or_else(|| Error::serialization_for_kind("HelmRelease", "storage Secret missing release key"))?;

    let release = decode_release_blob(&blob.0)?;
    let manifest = release
        .get("manifest")
        .and_then(|m| m.as_str())
        .ok_or_else(|| Error::serialization_for_kind("HelmRelease", "release blob missing manifest"))?;

    Ok(parse_manifest_documents(manifest, release_namespace))
}

/// Decode the Helm release blob: base64, gzip if the magic bytes match,
/// then JSON
fn decode_release_blob(raw: &[u8]) -> Result<Value> {
    let decoded = BASE64
        .decode(raw)
        .map_err(|e| Error::serialization_for_kind("HelmRelease", format!("release blob is not base64: {}", e)))?;

    let is_gzipped = decoded.len() >= 3 && decoded[..3] == [0x1f, 0x8b, 0x08];
    let bytes = if is_gzipped {
        let mut decompressed = Vec::new();
        flate2::read::GzDecoder::new(&decoded[..])
            .read_to_end(&mut decompressed)
            .map_err(|e| {
                Error::serialization_for_kind("HelmRelease", format!("gzip decode failed: {}", e))
            })?;
        decompressed
    } else {
        decoded
    };

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::serialization_for_kind("HelmRelease", format!("release JSON invalid: {}", e)))
}

/// Split a rendered Helm manifest into inventory entries
///
/// Documents that fail to parse are skipped; a chart with one broken
/// template should still surface its other objects.
fn parse_manifest_documents(manifest: &str, release_namespace: &str) -> Vec<InventoryEntry> {
    manifest
        .split("---\n")
        .filter_map(|doc| {
            let doc = doc.trim();
            if doc.is_empty() {
                return None;
            }
            let resource: Value = match serde_yaml::from_str(doc) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "Skipping unparseable manifest document");
                    return None;
                }
            };

            let kind = resource.get("kind")?.as_str()?.to_string();
            let metadata = resource.get("metadata")?;
            let name = metadata.get("name")?.as_str()?.to_string();
            let namespace = metadata
                .get("namespace")
                .and_then(|n| n.as_str())
                .unwrap_or(release_namespace)
                .to_string();
            let api_version = resource
                .get("apiVersion")
                .and_then(|v| v.as_str())
                .unwrap_or("v1");
            let (group, version) = parse_api_version(api_version);

            Some(InventoryEntry {
                group,
                version,
                kind,
                namespace,
                name,
            })
        })
        .collect()
}

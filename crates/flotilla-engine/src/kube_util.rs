//! Shared helpers for dynamic Kubernetes API access
//!
//! Builds `ApiResource` values from apiVersion strings and reads common
//! metadata fields out of dynamically-typed objects.

use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use serde_json::Value;

/// Split an apiVersion string into (group, version)
///
/// Core-group resources ("v1") have an empty group.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource from a known apiVersion and kind
///
/// The version is used exactly as given; use discovery when the server's
/// served version matters.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Lowercase-plural a kind name
///
/// Covers the kinds the engine touches; falls back to naive pluralization.
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    match lower.as_str() {
        "gitrepository" => "gitrepositories".to_string(),
        "helmrepository" => "helmrepositories".to_string(),
        "ingress" => "ingresses".to_string(),
        "networkpolicy" => "networkpolicies".to_string(),
        _ => {
            if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
                format!("{}es", lower)
            } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
                format!("{}ies", &lower[..lower.len() - 1])
            } else {
                format!("{}s", lower)
            }
        }
    }
}

/// Built-in apiVersion for the workload kinds the engine patches and expands
///
/// Returns None for kinds outside the known workload set.
pub fn workload_api_version(kind: &str) -> Option<&'static str> {
    match kind {
        "Deployment" | "ReplicaSet" | "StatefulSet" | "DaemonSet" => Some("apps/v1"),
        "Job" | "CronJob" => Some("batch/v1"),
        "Pod" => Some("v1"),
        _ => None,
    }
}

/// Serialize a DynamicObject to JSON with apiVersion/kind injected
///
/// DynamicObject doesn't include its type metadata in serialization, so we
/// add it back for downstream consumers that dispatch on kind.
pub fn object_to_value(obj: &DynamicObject, api_version: &str, kind: &str) -> Option<Value> {
    let mut value = serde_json::to_value(obj).ok()?;
    if let Some(map) = value.as_object_mut() {
        map.insert(
            "apiVersion".to_string(),
            Value::String(api_version.to_string()),
        );
        map.insert("kind".to_string(), Value::String(kind.to_string()));
    }
    Some(value)
}

/// Read `metadata.<field>` as a string from an object value
pub fn metadata_str<'a>(obj: &'a Value, field: &str) -> Option<&'a str> {
    obj.get("metadata")?.get(field)?.as_str()
}

/// Read the object's kind
pub fn kind_str(obj: &Value) -> Option<&str> {
    obj.get("kind")?.as_str()
}

/// Whether any of the object's ownerReferences carries the given UID
pub fn has_owner_uid(obj: &Value, uid: &str) -> bool {
    obj.get("metadata")
        .and_then(|m| m.get("ownerReferences"))
        .and_then(|o| o.as_array())
        .map(|refs| {
            refs.iter()
                .any(|r| r.get("uid").and_then(|u| u.as_str()) == Some(uid))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_api_version() {
        assert_eq!(
            parse_api_version("apps/v1"),
            ("apps".to_string(), "v1".to_string())
        );
        assert_eq!(parse_api_version("v1"), (String::new(), "v1".to_string()));
        assert_eq!(
            parse_api_version("kustomize.toolkit.fluxcd.io/v1"),
            ("kustomize.toolkit.fluxcd.io".to_string(), "v1".to_string())
        );
    }

    #[test]
    fn test_pluralize_known_and_fallback() {
        assert_eq!(pluralize_kind("GitRepository"), "gitrepositories");
        assert_eq!(pluralize_kind("Kustomization"), "kustomizations");
        assert_eq!(pluralize_kind("Deployment"), "deployments");
        assert_eq!(pluralize_kind("Ingress"), "ingresses");
    }

    #[test]
    fn test_workload_api_versions() {
        assert_eq!(workload_api_version("Deployment"), Some("apps/v1"));
        assert_eq!(workload_api_version("CronJob"), Some("batch/v1"));
        assert_eq!(workload_api_version("Pod"), Some("v1"));
        assert_eq!(workload_api_version("ConfigMap"), None);
    }

    #[test]
    fn test_has_owner_uid() {
        let obj = json!({
            "metadata": {
                "name": "web-7d9f",
                "ownerReferences": [
                    {"kind": "Deployment", "name": "web", "uid": "uid-1"}
                ]
            }
        });
        assert!(has_owner_uid(&obj, "uid-1"));
        assert!(!has_owner_uid(&obj, "uid-2"));
        assert!(!has_owner_uid(&json!({"metadata": {}}), "uid-1"));
    }
}

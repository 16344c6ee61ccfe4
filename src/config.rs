//! Fleet configuration file
//!
//! The daemon reads a YAML file naming each cluster and the path of its
//! kubeconfig. Kubeconfig contents are loaded at registration time and
//! held in memory only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use flotilla_common::store::CredentialSource;
use flotilla_common::{Error, Result};

/// Top-level fleet configuration
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetConfig {
    /// Clusters to register at startup
    pub clusters: Vec<ClusterEntry>,
}

/// One cluster in the fleet file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterEntry {
    /// Unique cluster id
    pub id: String,
    /// Path to the cluster's kubeconfig
    pub kubeconfig: PathBuf,
    /// Per-cluster sync interval override, in seconds
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
}

impl ClusterEntry {
    /// The sync interval override as a Duration, if configured
    pub fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval_secs.map(Duration::from_secs)
    }
}

impl FleetConfig {
    /// Load and parse a fleet file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::internal_with_context("config", format!("failed to read {:?}: {}", path, e))
        })?;
        let config: FleetConfig = serde_yaml::from_str(&raw)
            .map_err(|e| Error::serialization(format!("invalid fleet config: {}", e)))?;
        if config.clusters.is_empty() {
            return Err(Error::serialization("fleet config lists no clusters"));
        }
        Ok(config)
    }

    /// A credential source reading each cluster's kubeconfig from disk
    pub fn credential_source(&self) -> FileCredentialSource {
        FileCredentialSource {
            paths: self
                .clusters
                .iter()
                .map(|c| (c.id.clone(), c.kubeconfig.clone()))
                .collect(),
        }
    }
}

/// `CredentialSource` backed by kubeconfig files on disk
///
/// The standalone daemon's stand-in for the database layer's decrypted
/// credential lookup. File contents are read at registration time and held
/// in memory only.
pub struct FileCredentialSource {
    paths: HashMap<String, PathBuf>,
}

#[async_trait::async_trait]
impl CredentialSource for FileCredentialSource {
    async fn credential(&self, cluster_id: &str) -> Result<String> {
        let path = self
            .paths
            .get(cluster_id)
            .ok_or_else(|| Error::cluster_not_found(cluster_id))?;
        tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::credential_invalid(cluster_id, format!("unreadable kubeconfig: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fleet_yaml() {
        let raw = "\
clusters:
  - id: prod-eu
    kubeconfig: /etc/flotilla/prod-eu.yaml
    syncIntervalSecs: 30
  - id: staging
    kubeconfig: /etc/flotilla/staging.yaml
";
        let config: FleetConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.clusters.len(), 2);
        assert_eq!(config.clusters[0].id, "prod-eu");
        assert_eq!(
            config.clusters[0].sync_interval(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.clusters[1].sync_interval(), None);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = FleetConfig::load(Path::new("/nonexistent/fleet.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[tokio::test]
    async fn test_file_credential_source() {
        let path = std::env::temp_dir().join("flotilla-test-kubeconfig.yaml");
        std::fs::write(&path, "apiVersion: v1\nkind: Config\n").unwrap();

        let config = FleetConfig {
            clusters: vec![ClusterEntry {
                id: "c1".to_string(),
                kubeconfig: path.clone(),
                sync_interval_secs: None,
            }],
        };
        let source = config.credential_source();

        let credential = source.credential("c1").await.unwrap();
        assert!(credential.contains("kind: Config"));

        let err = source.credential("unknown").await.unwrap_err();
        assert!(matches!(
            err,
            flotilla_common::Error::ClusterNotFound { .. }
        ));

        std::fs::remove_file(&path).ok();
    }
}

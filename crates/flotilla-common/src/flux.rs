//! The closed set of Flux custom-resource kinds the engine understands
//!
//! Each logical kind maps to its API group and an ordered, newest-first
//! list of candidate versions. Discovery probes the candidates against a
//! cluster's API server; the version actually served varies across Flux
//! releases, so nothing here hardcodes a single apiVersion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Flux source API group (GitRepository, HelmRepository)
pub const SOURCE_GROUP: &str = "source.toolkit.fluxcd.io";
/// Flux kustomize-controller API group
pub const KUSTOMIZE_GROUP: &str = "kustomize.toolkit.fluxcd.io";
/// Flux helm-controller API group
pub const HELM_GROUP: &str = "helm.toolkit.fluxcd.io";

/// A supported Flux custom-resource kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FluxKind {
    /// An applied kustomize overlay (kustomize-controller)
    Kustomization,
    /// A Helm release (helm-controller)
    HelmRelease,
    /// A Git source (source-controller)
    GitRepository,
    /// A Helm chart source (source-controller)
    HelmRepository,
}

impl FluxKind {
    /// All supported kinds, in sync order
    pub const ALL: [FluxKind; 4] = [
        FluxKind::Kustomization,
        FluxKind::HelmRelease,
        FluxKind::GitRepository,
        FluxKind::HelmRepository,
    ];

    /// The kind string as it appears in manifests
    pub fn as_str(&self) -> &'static str {
        match self {
            FluxKind::Kustomization => "Kustomization",
            FluxKind::HelmRelease => "HelmRelease",
            FluxKind::GitRepository => "GitRepository",
            FluxKind::HelmRepository => "HelmRepository",
        }
    }

    /// Parse a kind string, returning None for anything outside the closed set
    pub fn parse_optional(kind: &str) -> Option<FluxKind> {
        match kind {
            "Kustomization" => Some(FluxKind::Kustomization),
            "HelmRelease" => Some(FluxKind::HelmRelease),
            "GitRepository" => Some(FluxKind::GitRepository),
            "HelmRepository" => Some(FluxKind::HelmRepository),
            _ => None,
        }
    }

    /// API group serving this kind
    pub fn group(&self) -> &'static str {
        match self {
            FluxKind::Kustomization => KUSTOMIZE_GROUP,
            FluxKind::HelmRelease => HELM_GROUP,
            FluxKind::GitRepository | FluxKind::HelmRepository => SOURCE_GROUP,
        }
    }

    /// Lowercase plural resource name
    pub fn plural(&self) -> &'static str {
        match self {
            FluxKind::Kustomization => "kustomizations",
            FluxKind::HelmRelease => "helmreleases",
            FluxKind::GitRepository => "gitrepositories",
            FluxKind::HelmRepository => "helmrepositories",
        }
    }

    /// Candidate API versions, newest first
    ///
    /// Discovery returns the first candidate the cluster actually serves,
    /// which keeps the engine forward-compatible across Flux upgrades.
    pub fn candidate_versions(&self) -> &'static [&'static str] {
        match self {
            FluxKind::Kustomization => &["v1", "v1beta2", "v1beta1"],
            FluxKind::HelmRelease => &["v2", "v2beta2", "v2beta1"],
            FluxKind::GitRepository | FluxKind::HelmRepository => &["v1", "v1beta2", "v1beta1"],
        }
    }

    /// Whether this kind carries an applied-inventory and can root a
    /// resource tree
    pub fn is_root(&self) -> bool {
        matches!(self, FluxKind::Kustomization | FluxKind::HelmRelease)
    }
}

impl fmt::Display for FluxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Error types for the Flotilla engine
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries contextual information like cluster ids and kind
//! names. Control-action failures keep the underlying Kubernetes API error
//! intact so the operator sees the server's literal response.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Flotilla operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error, surfaced verbatim
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A cluster credential was rejected during registration
    #[error("invalid credential for {cluster}: {message}")]
    CredentialInvalid {
        /// Cluster id whose registration was rejected
        cluster: String,
        /// Description of what's invalid
        message: String,
    },

    /// A cluster could not be reached (health check or fetch failure)
    #[error("cluster {cluster} unreachable: {message}")]
    ClusterUnreachable {
        /// Cluster id that failed its reachability probe
        cluster: String,
        /// Description of the failure
        message: String,
    },

    /// No cluster is registered under the given id
    #[error("cluster {cluster} not registered")]
    ClusterNotFound {
        /// The unknown cluster id
        cluster: String,
    },

    /// A Flux CRD is not served by the cluster's API server
    ///
    /// This is the expected state for clusters without Flux installed and is
    /// not surfaced to the operator as a failure.
    #[error("kind {kind} not served by cluster {cluster}")]
    UnsupportedKind {
        /// Cluster id that was probed
        cluster: String,
        /// Logical kind that has no registered group/version
        kind: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being processed (if known)
        kind: Option<String>,
    },

    /// A bounded operation exceeded its deadline
    #[error("timeout during {operation}")]
    Timeout {
        /// The operation that ran out of time
        operation: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "sync", "hierarchy")
        context: String,
    },
}

impl Error {
    /// Create a credential error with cluster context
    pub fn credential_invalid(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::CredentialInvalid {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create an unreachable-cluster error
    pub fn cluster_unreachable(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ClusterUnreachable {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create a cluster-not-found error
    pub fn cluster_not_found(cluster: impl Into<String>) -> Self {
        Self::ClusterNotFound {
            cluster: cluster.into(),
        }
    }

    /// Create an unsupported-kind error for a cluster
    pub fn unsupported_kind(cluster: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnsupportedKind {
            cluster: cluster.into(),
            kind: kind.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a timeout error for a named operation
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Credential and serialization errors are not retryable (require a
    /// config fix). Unreachable clusters are retried on the next tick.
    /// Kubernetes errors depend on the response code.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Retry on transient K8s errors (connection, timeout)
                // Don't retry on 4xx errors (not found, forbidden, conflict)
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::CredentialInvalid { .. } => false,
            Error::ClusterUnreachable { .. } => true,
            Error::ClusterNotFound { .. } => false,
            Error::UnsupportedKind { .. } => false,
            Error::Serialization { .. } => false,
            Error::Timeout { .. } => true,
            Error::Internal { .. } => true,
        }
    }

    /// True if this wraps a 404 from the API server
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 404)
    }

    /// True if this wraps a 403 from the API server
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 403)
    }

    /// Get the cluster id if this error is associated with a specific cluster
    pub fn cluster(&self) -> Option<&str> {
        match self {
            Error::CredentialInvalid { cluster, .. } => Some(cluster),
            Error::ClusterUnreachable { cluster, .. } => Some(cluster),
            Error::ClusterNotFound { cluster } => Some(cluster),
            Error::UnsupportedKind { cluster, .. } => Some(cluster),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: a malformed kubeconfig is rejected at registration and the
    /// error names the cluster so the operator knows which entry to fix.
    #[test]
    fn story_credential_rejection_names_the_cluster() {
        let err = Error::credential_invalid("prod-eu", "no current context");
        assert!(err.to_string().contains("prod-eu"));
        assert!(err.to_string().contains("no current context"));
        assert_eq!(err.cluster(), Some("prod-eu"));
        assert!(!err.is_retryable());
    }

    /// Story: an unreachable cluster is a transient condition; the sync
    /// worker retries it on the next tick rather than giving up.
    #[test]
    fn story_unreachable_cluster_is_retryable() {
        let err = Error::cluster_unreachable("edge-1", "connection refused");
        assert!(err.is_retryable());
        assert_eq!(err.cluster(), Some("edge-1"));
    }

    /// Story: a cluster without Flux installed yields UnsupportedKind,
    /// which is expected and never retried.
    #[test]
    fn story_missing_flux_crds_are_expected() {
        let err = Error::unsupported_kind("bare-cluster", "Kustomization");
        assert!(err.to_string().contains("Kustomization"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_api_error_code_accessors() {
        let not_found = Error::Kube {
            source: kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "deployments.apps \"web\" not found".to_string(),
                reason: "NotFound".to_string(),
                code: 404,
            }),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_forbidden());
        assert!(!not_found.is_retryable());

        let forbidden = Error::Kube {
            source: kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "forbidden".to_string(),
                reason: "Forbidden".to_string(),
                code: 403,
            }),
        };
        assert!(forbidden.is_forbidden());
        assert!(!forbidden.is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let err = Error::Kube {
            source: kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "etcdserver: request timed out".to_string(),
                reason: "InternalError".to_string(),
                code: 500,
            }),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = Error::timeout("resource tree build");
        assert!(err.to_string().contains("resource tree build"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_internal_error_default_context() {
        let err = Error::internal("unexpected state");
        assert!(err.to_string().contains(&format!("[{}]", UNKNOWN_CONTEXT)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_serialization_error_with_kind() {
        let err = Error::serialization_for_kind("HelmRelease", "missing status");
        match &err {
            Error::Serialization { kind, .. } => {
                assert_eq!(kind.as_deref(), Some("HelmRelease"));
            }
            _ => panic!("Expected Serialization variant"),
        }
        assert!(!err.is_retryable());
        assert_eq!(err.cluster(), None);
    }
}

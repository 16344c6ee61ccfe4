//! Common types for Flotilla: errors, the Flux kind model, normalized
//! resource records, and the trait seams toward external collaborators
//! (status storage and credential lookup).

#![deny(missing_docs)]

pub mod error;
pub mod flux;
pub mod record;
pub mod store;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Annotation a Flux controller watches for reconcile requests
pub const RECONCILE_REQUEST_ANNOTATION: &str = "reconcile.fluxcd.io/requestedAt";

/// Pod-template annotation that triggers a rolling restart (kubectl convention)
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Default process-wide sync interval in seconds
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

//! Integration tests for the Flotilla engine against a real cluster
//!
//! Tests are organized by the story they tell:
//!
//! - `sync_stories`: registering clusters and syncing Flux state into the
//!   store, including credential rejection and partial-failure behavior
//!
//! - `tree_stories`: building resource trees from synced state and rolling
//!   health up through the ownership hierarchy
//!
//! - `action_stories`: dispatching reconcile requests and observing that
//!   repeated submission stays error-free
//!
//! - `log_stories`: aggregating pod logs across clusters with one
//!   unreachable member
//!
//! # Running These Tests
//!
//! Ignored by default; they need `FLOTILLA_TEST_KUBECONFIG` pointing at a
//! cluster with Flux bootstrapped:
//!
//! ```bash
//! FLOTILLA_TEST_KUBECONFIG=$HOME/.kube/config \
//!   cargo test --test flux -- --ignored --nocapture
//! ```

mod action_stories;
mod helpers;
mod log_stories;
mod sync_stories;
mod tree_stories;

//! Flotilla - multi-cluster Flux state aggregation and control
//!
//! Flotilla keeps one live API client per registered Kubernetes cluster,
//! periodically syncs normalized Flux resource state into a store,
//! reconstructs ownership hierarchies with rolled-up health, and dispatches
//! control actions (reconcile, suspend, resume, scale, restart) without an
//! interactive session to any cluster.
//!
//! The engine lives in [`flotilla_engine`]; this crate wraps it in a
//! standalone daemon that reads a fleet config file and runs the sync loop.

#![deny(missing_docs)]

pub mod config;

pub use flotilla_common::{Error, Result};
pub use flotilla_engine::Engine;

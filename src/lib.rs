// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # hub-operator - `MultiClusterHub` convergence operator for Kubernetes
//!
//! The operator drives a cluster toward the state declared by a single
//! `MultiClusterHub` custom resource: it installs CRDs and base templates,
//! converges the enabled hub components (application subscriptions, the
//! chart repository and the `MultiClusterEngine`), removes disabled ones and,
//! on deletion, tears everything down in a fixed order before releasing the
//! finalizer.
//!
//! ## Modules
//!
//! - [`crd`] - The `MultiClusterHub` custom resource and its status types
//! - [`reconcilers`] - Orchestrator, convergence primitives and teardown
//! - [`bodies`] - Desired-body factories for every child the hub owns
//! - [`store`] - Object store capability over `kube::Api<DynamicObject>`
//! - [`manifests`] - CRD, template and image manifest loading
//! - [`watches`] - Watch correlation and predicates
//! - [`controller`] - kube-runtime controller wiring
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use hub_operator::crd::{ComponentConfig, MultiClusterHubSpec, Overrides};
//!
//! let spec = MultiClusterHubSpec {
//!     overrides: Some(Overrides {
//!         components: vec![ComponentConfig {
//!             name: "search".to_string(),
//!             enabled: false,
//!         }],
//!         ..Default::default()
//!     }),
//!     ..Default::default()
//! };
//! assert!(!spec.is_enabled("search"));
//! ```

pub mod bodies;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod kinds;
pub mod labels;
pub mod manifests;
pub mod metrics;
pub mod reconcilers;
pub mod status_reasons;
pub mod store;
pub mod watches;

#[cfg(test)]
pub mod testing;

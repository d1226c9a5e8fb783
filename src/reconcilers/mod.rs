// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for the `MultiClusterHub`.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Hub and secondary object changes arrive via [`crate::watches`]
//! 2. **Reconcile** - [`reconcile_hub`] walks the convergence sequence
//! 3. **Converge** - Every child goes through [`ensure_present`] or [`ensure_absent`]
//! 4. **Status** - One status patch per pass, only when something changed
//!
//! # Modules
//!
//! - [`hub`] - The orchestrator: convergence steps, teardown branch, status sync
//! - [`components`] - The component table and component health
//! - [`defaults`] - Spec defaulting and version parsing
//! - [`overrides`] - Image override resolution
//! - [`resources`] - `ensure_present` / `ensure_absent` and identity labels
//! - [`validate`] - Allow-listed containment diff
//! - [`status`] - Condition ledger and the status updater
//! - [`finalizers`] - Finalizer handling and the teardown pipeline
//!
//! # Example
//!
//! ```rust,no_run
//! use hub_operator::context::Context;
//! use hub_operator::reconcilers::reconcile_hub;
//!
//! async fn reconcile(ctx: &Context) -> anyhow::Result<()> {
//!     let outcome = reconcile_hub(ctx, "open-cluster-management", "multiclusterhub").await?;
//!     println!("pass ended with {outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod components;
pub mod defaults;
pub mod finalizers;
pub mod hub;
pub mod overrides;
pub mod resources;
pub mod status;
pub mod validate;

pub use hub::{reconcile_hub, Outcome};
pub use resources::{ensure_absent, ensure_present};

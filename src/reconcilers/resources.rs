// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Idempotent convergence of individual child resources.
//!
//! - [`ensure_present`] creates a missing child or merge-patches the
//!   allow-listed fields that drifted.
//! - [`ensure_absent`] deletes a child if it exists.
//!
//! Both report a [`Change`]. `Created`, `Updated` and `Deleted` are structural
//! changes; the orchestrator ends its pass on the first one in the component
//! steps and lets the next pass observe the result.
//!
//! # Example
//!
//! ```rust,ignore
//! use hub_operator::reconcilers::resources::ensure_present;
//!
//! let change = ensure_present(store, &hub, &mut status.conditions, &desired).await?;
//! if change.is_structural() {
//!     return Ok(Outcome::Requeue);
//! }
//! ```

use crate::crd::{ConditionStatus, ConditionType, HubCondition, MultiClusterHub};
use crate::errors::{HubError, HubResult, StoreError};
use crate::kinds;
use crate::labels::{INSTALLER_NAME, INSTALLER_NAMESPACE};
use crate::metrics::{record_error, record_resource_change};
use crate::reconcilers::status::set_condition;
use crate::reconcilers::validate::{validate, validate_paths, FieldPath};
use crate::status_reasons::{REASON_FAILED_CREATE, REASON_FAILED_PATCH, REASON_NEW_COMPONENT};
use crate::store::{display_name, ObjectStore};
use kube::api::DynamicObject;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};

/// What a convergence call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
    Created,
    Updated,
    Deleted,
    Unchanged,
}

impl Change {
    /// Whether the call mutated the cluster.
    #[must_use]
    pub fn is_structural(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Stamp the identity labels of `hub` on `obj`.
pub fn stamp_identity_labels(obj: &mut DynamicObject, hub: &MultiClusterHub) {
    let labels = obj.labels_mut();
    labels.insert(INSTALLER_NAME.to_string(), hub.name_any());
    labels.insert(
        INSTALLER_NAMESPACE.to_string(),
        hub.namespace().unwrap_or_default(),
    );
}

/// Whether `obj` carries both identity labels of `hub`.
#[must_use]
pub fn has_identity_of(obj: &DynamicObject, hub: &MultiClusterHub) -> bool {
    let labels = obj.labels();
    labels.get(INSTALLER_NAME) == Some(&hub.name_any())
        && labels.get(INSTALLER_NAMESPACE) == hub.namespace().as_ref()
}

fn record_failure(
    conditions: &mut Vec<HubCondition>,
    err: &StoreError,
    reason: &str,
    verb: &str,
    kind: &str,
    name: &str,
) {
    record_error(kind, err.metric_label());
    if err.is_retryable() {
        debug!("Transient failure to {verb} {kind} {name}: {err}");
        return;
    }
    warn!("Failed to {verb} {kind} {name}: {err}");
    set_condition(
        conditions,
        ConditionType::Progressing,
        ConditionStatus::False,
        reason,
        &format!("failed to {verb} {kind} {name}: {err}"),
    );
}

/// Ensure `desired` exists and its allow-listed fields match.
///
/// # Errors
///
/// Returns the classified store error. Permanent failures also set
/// `Progressing=False` with `FailedCreate` or `FailedPatch`.
pub async fn ensure_present(
    store: &dyn ObjectStore,
    hub: &MultiClusterHub,
    conditions: &mut Vec<HubCondition>,
    desired: &DynamicObject,
) -> HubResult<Change> {
    ensure_present_with(store, hub, conditions, desired, None).await
}

/// Like [`ensure_present`], comparing only `paths` instead of the kind's allow-list.
///
/// # Errors
///
/// See [`ensure_present`].
pub async fn ensure_present_with(
    store: &dyn ObjectStore,
    hub: &MultiClusterHub,
    conditions: &mut Vec<HubCondition>,
    desired: &DynamicObject,
    paths: Option<&[FieldPath]>,
) -> HubResult<Change> {
    let ar = kinds::of(desired)?;
    let namespace = desired.metadata.namespace.as_deref();
    let name = desired.name_any();
    let shown = display_name(namespace, &name);

    let live = store.get(&ar, namespace, &name).await?;

    let Some(live) = live else {
        let mut body = desired.clone();
        if namespace.is_some() && namespace == hub.meta().namespace.as_deref() {
            if let Some(owner) = hub.controller_owner_ref(&()) {
                body.owner_references_mut().push(owner);
            }
        }
        stamp_identity_labels(&mut body, hub);

        if let Err(e) = store.create(&ar, &body).await {
            record_failure(conditions, &e, REASON_FAILED_CREATE, "create", &ar.kind, &shown);
            return Err(e.into());
        }

        info!("Created {} {}", ar.kind, shown);
        record_resource_change(&ar.kind, "created");
        set_condition(
            conditions,
            ConditionType::Progressing,
            ConditionStatus::True,
            REASON_NEW_COMPONENT,
            &format!("created new resource: {} {}", ar.kind, name),
        );
        return Ok(Change::Created);
    };

    let live_value = serde_json::to_value(&live)?;
    let desired_value = serde_json::to_value(desired)?;
    let validation = match paths {
        Some(paths) => validate_paths(&live_value, &desired_value, paths),
        None => validate(&live_value, &desired_value),
    };

    if !validation.changed {
        debug!("{} {} is up to date", ar.kind, shown);
        return Ok(Change::Unchanged);
    }

    if let Err(e) = store
        .patch(&ar, namespace, &name, &validation.patch)
        .await
    {
        record_failure(conditions, &e, REASON_FAILED_PATCH, "patch", &ar.kind, &shown);
        return Err(e.into());
    }

    info!("Updated {} {}", ar.kind, shown);
    record_resource_change(&ar.kind, "updated");
    Ok(Change::Updated)
}

/// Ensure the object addressed by `desired` does not exist.
///
/// # Errors
///
/// Returns the classified store error for anything but an absent object.
pub async fn ensure_absent(store: &dyn ObjectStore, desired: &DynamicObject) -> HubResult<Change> {
    let ar = kinds::of(desired)?;
    let namespace = desired.metadata.namespace.as_deref();
    let name = desired.name_any();

    if store.get(&ar, namespace, &name).await?.is_none() {
        return Ok(Change::Unchanged);
    }

    match store.delete(&ar, namespace, &name).await {
        Ok(()) => {
            info!("Deleted {} {}", ar.kind, display_name(namespace, &name));
            record_resource_change(&ar.kind, "deleted");
            Ok(Change::Deleted)
        }
        Err(e) if e.is_not_found() => Ok(Change::Unchanged),
        Err(e) => {
            record_error(&ar.kind, e.metric_label());
            Err(HubError::Store(e))
        }
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;

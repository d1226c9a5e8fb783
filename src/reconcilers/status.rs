// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition ledger for the `MultiClusterHub`.
//!
//! The ledger is the ordered list in `status.conditions`. It holds at most one
//! condition per [`ConditionType`], in insertion order, and follows these
//! timestamp rules:
//!
//! - `lastTransitionTime` changes only when `status` changes
//! - `lastUpdateTime` changes when `status`, `reason` or `message` change
//! - setting an identical condition is a no-op
//!
//! # Example
//!
//! ```rust
//! use hub_operator::crd::{ConditionStatus, ConditionType};
//! use hub_operator::reconcilers::status::{find_condition, set_condition};
//!
//! let mut conditions = Vec::new();
//! set_condition(
//!     &mut conditions,
//!     ConditionType::Progressing,
//!     ConditionStatus::True,
//!     "NewComponent",
//!     "created new resource: Deployment search-api",
//! );
//! assert!(find_condition(&conditions, ConditionType::Progressing).is_some());
//! ```

use crate::crd::{
    ConditionStatus, ConditionType, HubCondition, MultiClusterHub, MultiClusterHubStatus,
};
use crate::errors::StoreError;
use crate::kinds;
use crate::store::ObjectStore;
use chrono::{DateTime, SecondsFormat, Utc};
use kube::ResourceExt;
use serde_json::{json, Value};
use tracing::debug;

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Set a condition using the current time.
///
/// Returns `true` when the ledger changed.
pub fn set_condition(
    conditions: &mut Vec<HubCondition>,
    condition_type: ConditionType,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> bool {
    set_condition_at(conditions, condition_type, status, reason, message, Utc::now())
}

/// Set a condition as observed at `now`.
///
/// Returns `true` when the ledger changed.
pub fn set_condition_at(
    conditions: &mut Vec<HubCondition>,
    condition_type: ConditionType,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> bool {
    let stamp = timestamp(now);

    let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) else {
        conditions.push(HubCondition {
            r#type: condition_type,
            status,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            last_transition_time: Some(stamp.clone()),
            last_update_time: Some(stamp),
        });
        return true;
    };

    let status_changed = existing.status != status;
    let content_changed = status_changed
        || existing.reason.as_deref() != Some(reason)
        || existing.message.as_deref() != Some(message);

    if !content_changed {
        return false;
    }

    if status_changed {
        existing.status = status;
        existing.last_transition_time = Some(stamp.clone());
    }
    existing.reason = Some(reason.to_string());
    existing.message = Some(message.to_string());
    existing.last_update_time = Some(stamp);
    true
}

/// Find a condition by type.
#[must_use]
pub fn find_condition(
    conditions: &[HubCondition],
    condition_type: ConditionType,
) -> Option<&HubCondition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Remove a condition by type. Returns `true` if one was removed.
pub fn remove_condition(conditions: &mut Vec<HubCondition>, condition_type: ConditionType) -> bool {
    let before = conditions.len();
    conditions.retain(|c| c.r#type != condition_type);
    conditions.len() != before
}

/// Compare two ledgers ignoring timestamps. Order matters.
#[must_use]
pub fn conditions_equal(current: &[HubCondition], new: &[HubCondition]) -> bool {
    current.len() == new.len()
        && current.iter().zip(new).all(|(a, b)| {
            a.r#type == b.r#type
                && a.status == b.status
                && a.reason == b.reason
                && a.message == b.message
        })
}

/// Compare two statuses ignoring condition timestamps.
#[must_use]
pub fn status_equal(current: &MultiClusterHubStatus, new: &MultiClusterHubStatus) -> bool {
    current.phase == new.phase
        && current.current_version == new.current_version
        && current.desired_version == new.desired_version
        && current.components == new.components
        && conditions_equal(&current.conditions, &new.conditions)
}

/// Collects status changes for one pass and persists them with a single patch.
pub struct HubStatusUpdater {
    namespace: String,
    name: String,
    original: MultiClusterHubStatus,
}

impl HubStatusUpdater {
    /// Remember the status the hub had when the pass started.
    #[must_use]
    pub fn new(hub: &MultiClusterHub) -> Self {
        Self {
            namespace: hub.namespace().unwrap_or_default(),
            name: hub.name_any(),
            original: hub.status.clone().unwrap_or_default(),
        }
    }

    /// Whether `new` differs semantically from the original status.
    #[must_use]
    pub fn has_changes(&self, new: &MultiClusterHubStatus) -> bool {
        !status_equal(&self.original, new)
    }

    /// Persist `new` with one status merge patch if it differs from the original.
    ///
    /// Returns `true` when a patch was sent. A hub that no longer exists is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns the classified store error if the patch fails.
    pub async fn apply(
        &self,
        store: &dyn ObjectStore,
        new: &MultiClusterHubStatus,
    ) -> Result<bool, StoreError> {
        if !self.has_changes(new) {
            debug!(
                "Status of MultiClusterHub {}/{} unchanged, skipping patch",
                self.namespace, self.name
            );
            return Ok(false);
        }

        let mut patch = json!({ "status": new });
        for stale in self
            .original
            .components
            .keys()
            .filter(|k| !new.components.contains_key(*k))
        {
            patch["status"]["components"][stale] = Value::Null;
        }
        match store
            .patch_status(
                &kinds::multicluster_hub(),
                Some(&self.namespace),
                &self.name,
                &patch,
            )
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => {
                debug!(
                    "MultiClusterHub {}/{} is gone, dropping status update",
                    self.namespace, self.name
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition types, reasons and phases for the `MultiClusterHub`.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a condition
//! has a particular status. They are stable and safe to match on.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   phase: Installing
//!   conditions:
//!     - type: Progressing
//!       status: "True"
//!       reason: NewComponent
//!       message: "created new resource: Deployment multiclusterhub-repo"
//! ```

// ============================================================================
// Progressing Reasons
// ============================================================================

/// A child resource was created during the pass
pub const REASON_NEW_COMPONENT: &str = "NewComponent";

/// The pause annotation is present
pub const REASON_PAUSED: &str = "Paused";

/// The pause annotation was removed
pub const REASON_RESUMED: &str = "Resumed";

/// Creating a child resource failed permanently
pub const REASON_FAILED_CREATE: &str = "FailedCreate";

/// Patching a child resource failed permanently
pub const REASON_FAILED_PATCH: &str = "FailedPatch";

/// A CRD file could not be read or validated
pub const REASON_CRD_RENDER_FAILURE: &str = "CRDRenderFailure";

/// A template file could not be read or validated
pub const REASON_RESOURCE_RENDER_FAILURE: &str = "ResourceRenderFailure";

/// Applying rendered templates failed
pub const REASON_DEPLOY_FAILURE: &str = "DeployFailure";

/// The configured image pull secret does not exist
pub const REASON_PULL_SECRET_MISSING: &str = "PullSecretMissing";

/// Required configuration is missing or malformed
pub const REASON_CONFIG_INVALID: &str = "InvalidConfiguration";

// ============================================================================
// Other Condition Reasons
// ============================================================================

/// The hub carries a deletion timestamp
pub const REASON_DELETION_TIMESTAMP_PRESENT: &str = "DeletionTimestampPresent";

/// An upgrade is blocked by an incompatible component setting
pub const REASON_RESOURCE_BLOCKED: &str = "ResourceBlocked";

/// Every enabled component reports healthy
pub const REASON_ALL_COMPONENTS_HEALTHY: &str = "ComponentsAvailable";

/// At least one enabled component is not healthy yet
pub const REASON_COMPONENTS_UNAVAILABLE: &str = "ComponentsUnavailable";

// ============================================================================
// Phases
// ============================================================================

/// No status has been computed yet
pub const PHASE_PENDING: &str = "Pending";

/// First install in progress
pub const PHASE_INSTALLING: &str = "Installing";

/// Upgrade in progress
pub const PHASE_UPDATING: &str = "Updating";

/// Everything is healthy
pub const PHASE_RUNNING: &str = "Running";

/// Convergence is paused
pub const PHASE_PAUSED: &str = "Paused";

/// An upgrade is blocked
pub const PHASE_UPDATING_BLOCKED: &str = "UpdatingBlocked";

/// Teardown in progress
pub const PHASE_UNINSTALLING: &str = "Uninstalling";

#[cfg(test)]
#[path = "status_reasons_tests.rs"]
mod status_reasons_tests;

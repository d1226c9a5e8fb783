// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines the identity labels stamped on every child resource
//! and the hub annotations read by the controller.

// ============================================================================
// Identity Labels
// ============================================================================

/// Name of the hub that installed a child resource
pub const INSTALLER_NAME: &str = "installer.name";

/// Namespace of the hub that installed a child resource
pub const INSTALLER_NAMESPACE: &str = "installer.namespace";

/// Component that produced a child resource, used by the garbage sweep
pub const HUB_COMPONENT: &str = "operator.open-cluster-management.io/component";

/// Label placed on the self-managed `ManagedCluster`
pub const LOCAL_CLUSTER: &str = "local-cluster";

// ============================================================================
// Kubernetes Standard Labels
// ============================================================================

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for the tool managing the resource
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for `app.kubernetes.io/managed-by` on hub children
pub const MANAGED_BY_HUB: &str = "multiclusterhub-operator";

/// Label used by pod selectors on bodies rendered by the operator
pub const APP: &str = "app";

// ============================================================================
// Hub Annotations
// ============================================================================

/// Pause marker; the hub halts convergence while this is `"true"`
pub const ANNOTATION_PAUSE: &str = "mch-pause";

/// Image repository override; replaces the repository of every resolved image
pub const ANNOTATION_IMAGE_REPOSITORY: &str = "mch-imageRepository";

/// Name of a config map in the hub namespace layering extra image overrides
pub const ANNOTATION_IMAGE_OVERRIDES_CM: &str = "mch-imageOverridesCM";

/// Marks a `MultiClusterEngine` that existed before the hub adopted it
pub const ANNOTATION_ADOPTED: &str = "installer.open-cluster-management.io/adopted";

// ============================================================================
// Config Map Keys
// ============================================================================

/// Key of the image override data in an overrides config map
pub const OVERRIDES_CM_KEY: &str = "manifest.json";

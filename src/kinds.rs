// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! API resource descriptors for every kind the hub touches.
//!
//! Children are handled as [`DynamicObject`]s so a single object store can
//! serve every kind; these helpers return the [`ApiResource`] used to address
//! them.

use crate::errors::{HubError, HubResult};
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};

fn gvk(group: &str, version: &str, kind: &str) -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, kind))
}

/// `apps/v1 Deployment`
#[must_use]
pub fn deployment() -> ApiResource {
    gvk("apps", "v1", "Deployment")
}

/// `v1 Service`
#[must_use]
pub fn service() -> ApiResource {
    gvk("", "v1", "Service")
}

/// `v1 ConfigMap`
#[must_use]
pub fn config_map() -> ApiResource {
    gvk("", "v1", "ConfigMap")
}

/// `v1 Secret`
#[must_use]
pub fn secret() -> ApiResource {
    gvk("", "v1", "Secret")
}

/// `v1 Namespace`
#[must_use]
pub fn namespace() -> ApiResource {
    gvk("", "v1", "Namespace")
}

/// Application subscription (`apps.open-cluster-management.io/v1 Subscription`)
#[must_use]
pub fn app_subscription() -> ApiResource {
    gvk("apps.open-cluster-management.io", "v1", "Subscription")
}

/// `apps.open-cluster-management.io/v1 Channel`
#[must_use]
pub fn channel() -> ApiResource {
    gvk("apps.open-cluster-management.io", "v1", "Channel")
}

/// `apps.open-cluster-management.io/v1 HelmRelease`
#[must_use]
pub fn helm_release() -> ApiResource {
    gvk("apps.open-cluster-management.io", "v1", "HelmRelease")
}

/// `apiextensions.k8s.io/v1 CustomResourceDefinition`
#[must_use]
pub fn crd() -> ApiResource {
    gvk("apiextensions.k8s.io", "v1", "CustomResourceDefinition")
}

/// `apiregistration.k8s.io/v1 APIService`
#[must_use]
pub fn api_service() -> ApiResource {
    gvk("apiregistration.k8s.io", "v1", "APIService")
}

/// `admissionregistration.k8s.io/v1 MutatingWebhookConfiguration`
#[must_use]
pub fn mutating_webhook() -> ApiResource {
    gvk(
        "admissionregistration.k8s.io",
        "v1",
        "MutatingWebhookConfiguration",
    )
}

/// `admissionregistration.k8s.io/v1 ValidatingWebhookConfiguration`
#[must_use]
pub fn validating_webhook() -> ApiResource {
    gvk(
        "admissionregistration.k8s.io",
        "v1",
        "ValidatingWebhookConfiguration",
    )
}

/// `rbac.authorization.k8s.io/v1 ClusterRole`
#[must_use]
pub fn cluster_role() -> ApiResource {
    gvk("rbac.authorization.k8s.io", "v1", "ClusterRole")
}

/// `rbac.authorization.k8s.io/v1 ClusterRoleBinding`
#[must_use]
pub fn cluster_role_binding() -> ApiResource {
    gvk("rbac.authorization.k8s.io", "v1", "ClusterRoleBinding")
}

/// `multicluster.openshift.io/v1 MultiClusterEngine`
#[must_use]
pub fn multicluster_engine() -> ApiResource {
    gvk("multicluster.openshift.io", "v1", "MultiClusterEngine")
}

/// `cluster.open-cluster-management.io/v1 ManagedCluster`
#[must_use]
pub fn managed_cluster() -> ApiResource {
    gvk("cluster.open-cluster-management.io", "v1", "ManagedCluster")
}

/// `operator.openshift.io/v1 Console`
#[must_use]
pub fn console() -> ApiResource {
    gvk("operator.openshift.io", "v1", "Console")
}

/// `console.openshift.io/v1 ConsolePlugin`
#[must_use]
pub fn console_plugin() -> ApiResource {
    gvk("console.openshift.io", "v1", "ConsolePlugin")
}

/// `config.openshift.io/v1 ClusterVersion`
#[must_use]
pub fn cluster_version() -> ApiResource {
    gvk("config.openshift.io", "v1", "ClusterVersion")
}

/// `config.openshift.io/v1 Ingress`
#[must_use]
pub fn ingress_config() -> ApiResource {
    gvk("config.openshift.io", "v1", "Ingress")
}

/// `operator.open-cluster-management.io/v1 MultiClusterHub`
#[must_use]
pub fn multicluster_hub() -> ApiResource {
    ApiResource::erase::<crate::crd::MultiClusterHub>(&())
}

/// Resolve the [`ApiResource`] of an object from its type metadata.
///
/// # Errors
///
/// Returns a configuration error if the object carries no `apiVersion`/`kind`.
pub fn of(obj: &DynamicObject) -> HubResult<ApiResource> {
    let types = obj.types.as_ref().ok_or_else(|| {
        HubError::config(format!(
            "object {} has no apiVersion/kind",
            obj.metadata.name.as_deref().unwrap_or("<unnamed>")
        ))
    })?;
    let gvk = GroupVersionKind::try_from(types)
        .map_err(|e| HubError::config(format!("invalid apiVersion {}: {e}", types.api_version)))?;
    Ok(ApiResource::from_gvk(&gvk))
}

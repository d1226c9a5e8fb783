// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Values come from command line flags with environment variable fallbacks.
//! Version-gated behavior (compatibility guards and the self-management
//! migration) is plain data here so releases can change it without touching
//! the orchestrator.

use crate::constants::{
    DEFAULT_MANIFESTS_PATH, DEFAULT_METRICS_BIND_ADDRESS,
    DEFAULT_OPERATOR_VERSION, ENV_CRDS_PATH, ENV_MANIFESTS_PATH, ENV_OPERATOR_VERSION,
    ENV_TEMPLATES_PATH, ENV_UNIT_TEST, RESYNC_PERIOD_SECS, SUBSCRIPTION_OPERATOR_DEPLOYMENT,
};
use crate::labels::{INSTALLER_NAME, INSTALLER_NAMESPACE};
use clap::Parser;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use std::path::PathBuf;
use std::time::Duration;

/// A resource retired by a release, identified by kind and name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetiredResource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    /// Namespace of the resource; `None` places it in the hub namespace.
    pub namespace: Option<String>,
    /// Cluster-scoped resources ignore `namespace`.
    pub cluster_scoped: bool,
}

impl RetiredResource {
    /// API resource of the retired kind.
    #[must_use]
    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk(
            &self.group,
            &self.version,
            &self.kind,
        ))
    }

    /// Desired body used to address the resource with `ensure_absent`.
    #[must_use]
    pub fn body(&self, hub_namespace: &str) -> DynamicObject {
        let obj = DynamicObject::new(&self.name, &self.api_resource());
        if self.cluster_scoped {
            obj
        } else {
            obj.within(self.namespace.as_deref().unwrap_or(hub_namespace))
        }
    }
}

/// Blocks an upgrade between two version lines while a component is enabled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompatibilityGuard {
    /// Prefix `status.currentVersion` must start with.
    pub from_prefix: String,
    /// Prefix `status.desiredVersion` must start with.
    pub to_prefix: String,
    /// Component that must be disabled for the upgrade to proceed.
    pub blocking_component: String,
    /// Message of the `Blocked` condition.
    pub message: String,
    /// Resource removed once the guard no longer blocks.
    pub retired: Option<RetiredResource>,
}

impl CompatibilityGuard {
    /// Whether this guard applies to the given versions.
    #[must_use]
    pub fn matches(&self, current: &str, desired: &str) -> bool {
        current.starts_with(&self.from_prefix) && desired.starts_with(&self.to_prefix)
    }
}

/// One-time migration of the hub self-management resources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelfManagementMigration {
    /// Prefix `status.currentVersion` must start with for the migration to run.
    pub version_prefix: String,
    /// Resources removed by the migration.
    pub retired: Vec<RetiredResource>,
}

/// Compatibility guards shipped with this release.
#[must_use]
pub fn default_compatibility_guards() -> Vec<CompatibilityGuard> {
    vec![CompatibilityGuard {
        from_prefix: "2.4".to_string(),
        to_prefix: "2.5".to_string(),
        blocking_component: "cluster-backup".to_string(),
        message: "When upgrading from version 2.4 to 2.5, cluster backup must be disabled"
            .to_string(),
        retired: Some(RetiredResource {
            group: "apps.open-cluster-management.io".to_string(),
            version: "v1".to_string(),
            kind: "Subscription".to_string(),
            name: "cluster-backup-chart-sub".to_string(),
            namespace: None,
            cluster_scoped: false,
        }),
    }]
}

/// Runtime configuration of the operator.
#[derive(Parser, Debug, Clone)]
#[command(name = "hub-operator", version, about = "MultiClusterHub convergence operator")]
pub struct OperatorConfig {
    /// Directory holding the CRD YAML files to install
    #[arg(long, env = ENV_CRDS_PATH)]
    pub crds_path: Option<PathBuf>,

    /// Directory holding the base templates (`<dir>/multiclusterhub/base`)
    #[arg(long, env = ENV_TEMPLATES_PATH)]
    pub templates_path: Option<PathBuf>,

    /// Directory holding `<version>.json` image manifests
    #[arg(long, env = ENV_MANIFESTS_PATH, default_value = DEFAULT_MANIFESTS_PATH)]
    pub manifests_path: PathBuf,

    /// Version of this operator; reported as `status.desiredVersion`
    #[arg(long, env = ENV_OPERATOR_VERSION, default_value = DEFAULT_OPERATOR_VERSION)]
    pub operator_version: String,

    /// Test harness mode: skips cluster discovery and self-registration
    #[arg(long, env = ENV_UNIT_TEST)]
    pub unit_test: bool,

    /// Only watch hubs in this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Address the Prometheus endpoint listens on
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    pub metrics_bind_address: String,

    /// Requeue delay while waiting on the cluster, in seconds
    #[arg(long, default_value_t = RESYNC_PERIOD_SECS)]
    pub resync_secs: u64,

    /// Deployment that must be available before CRDs are installed
    #[arg(long, default_value = SUBSCRIPTION_OPERATOR_DEPLOYMENT)]
    pub dependency_deployment: String,

    #[arg(skip = default_compatibility_guards())]
    pub compatibility_guards: Vec<CompatibilityGuard>,

    #[arg(skip)]
    pub self_management_migration: Option<SelfManagementMigration>,
}

impl OperatorConfig {
    /// Requeue delay while waiting on the cluster.
    #[must_use]
    pub fn resync(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }

    /// Configuration with no paths set, used by tests and tools.
    #[must_use]
    pub fn for_version(version: &str) -> Self {
        Self {
            crds_path: None,
            templates_path: None,
            manifests_path: PathBuf::from(DEFAULT_MANIFESTS_PATH),
            operator_version: version.to_string(),
            unit_test: true,
            watch_namespace: None,
            metrics_bind_address: DEFAULT_METRICS_BIND_ADDRESS.to_string(),
            resync_secs: RESYNC_PERIOD_SECS,
            dependency_deployment: SUBSCRIPTION_OPERATOR_DEPLOYMENT.to_string(),
            compatibility_guards: default_compatibility_guards(),
            self_management_migration: None,
        }
    }
}

/// Label selector matching children installed by the given hub.
#[must_use]
pub fn installer_selector(hub_name: &str, hub_namespace: &str) -> String {
    format!("{INSTALLER_NAME}={hub_name},{INSTALLER_NAMESPACE}={hub_namespace}")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

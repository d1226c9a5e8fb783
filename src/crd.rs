// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for the `MultiClusterHub`.
//!
//! A `MultiClusterHub` declares the desired set of hub capabilities: which
//! components are enabled, the availability tier, image overrides and ingress
//! configuration. The controller drives the cluster toward that description and
//! reports progress through [`MultiClusterHubStatus`].
//!
//! # Example
//!
//! ```yaml
//! apiVersion: operator.open-cluster-management.io/v1
//! kind: MultiClusterHub
//! metadata:
//!   name: multiclusterhub
//!   namespace: open-cluster-management
//! spec:
//!   availabilityConfig: Basic
//!   overrides:
//!     components:
//!       - name: search
//!         enabled: false
//! ```

use crate::labels::{ANNOTATION_IMAGE_OVERRIDES_CM, ANNOTATION_IMAGE_REPOSITORY, ANNOTATION_PAUSE};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Availability tier of the hub.
///
/// `High` runs replicated bodies; `Basic` runs a single replica of each.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub enum AvailabilityType {
    #[default]
    High,
    Basic,
}

/// Per-component enablement entry in `spec.overrides.components`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    /// Component name, e.g. `search` or `cluster-backup`.
    pub name: String,

    /// Whether the component is installed.
    pub enabled: bool,
}

/// Overrides applied on top of the defaults.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    /// Pull policy passed to every rendered container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Component enablement. Entries are unique by name after defaulting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentConfig>,
}

/// Ingress configuration.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    /// TLS cipher suites; defaulted when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssl_ciphers: Vec<String>,
}

/// `MultiClusterHub` declares the desired state of a multicluster management hub.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "operator.open-cluster-management.io",
    version = "v1",
    kind = "MultiClusterHub",
    namespaced,
    shortname = "mch",
    doc = "MultiClusterHub defines the configuration for an instance of a multicluster management hub. The operator converges all hub components, the engine and base templates toward this description."
)]
#[kube(status = "MultiClusterHubStatus")]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#)]
#[serde(rename_all = "camelCase")]
pub struct MultiClusterHubSpec {
    /// Availability tier. Defaults to `High`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_config: Option<AvailabilityType>,

    /// Name of the pull secret copied to every rendered workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<String>,

    /// Config map holding a custom certificate authority bundle.
    #[serde(
        default,
        rename = "customCAConfigmap",
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_ca_configmap: Option<String>,

    /// Ingress settings.
    #[serde(default)]
    pub ingress: IngressSpec,

    /// Component and image overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Overrides>,

    /// When true the hub does not import itself as a managed cluster.
    #[serde(default)]
    pub disable_hub_self_management: bool,

    /// When true certificate management runs in its own namespace.
    #[serde(default)]
    pub separate_certificate_management: bool,

    /// Node selector applied to every rendered workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Deprecated: use `overrides.components` with `cluster-backup`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_cluster_backup: Option<bool>,

    /// Deprecated: use `overrides.components` with `cluster-proxy-addon`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_cluster_proxy_addon: Option<bool>,
}

/// Type of a hub status condition.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConditionType {
    Progressing,
    Complete,
    Terminating,
    Blocked,
}

/// Status of a hub status condition.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// One observation of the hub state. At most one condition exists per type.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubCondition {
    /// Condition type.
    pub r#type: ConditionType,

    /// Condition status.
    pub status: ConditionStatus,

    /// Brief CamelCase reason for the condition's last update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the status changed (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,

    /// Last time status, reason or message changed (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
}

/// Health of one hub component.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    /// `True` when every expected deployment is available.
    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `MultiClusterHub` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultiClusterHubStatus {
    /// Aggregate phase, e.g. `Installing` or `Running`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Ordered condition ledger.
    #[serde(default)]
    pub conditions: Vec<HubCondition>,

    /// Version that is fully rolled out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,

    /// Version of the running operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_version: Option<String>,

    /// Health keyed by component name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, ComponentHealth>,
}

impl MultiClusterHubSpec {
    /// Whether the named component is enabled in `overrides.components`.
    ///
    /// Components without an entry are disabled; defaulting adds an entry for
    /// every known component before this is consulted.
    #[must_use]
    pub fn is_enabled(&self, component: &str) -> bool {
        self.overrides
            .as_ref()
            .and_then(|o| o.components.iter().find(|c| c.name == component))
            .is_some_and(|c| c.enabled)
    }

    /// Whether an entry for the named component exists.
    #[must_use]
    pub fn has_component(&self, component: &str) -> bool {
        self.overrides
            .as_ref()
            .is_some_and(|o| o.components.iter().any(|c| c.name == component))
    }

    /// Set the enablement of a component, adding an entry if needed.
    pub fn set_enabled(&mut self, component: &str, enabled: bool) {
        let overrides = self.overrides.get_or_insert_with(Overrides::default);
        if let Some(entry) = overrides
            .components
            .iter_mut()
            .find(|c| c.name == component)
        {
            entry.enabled = enabled;
        } else {
            overrides.components.push(ComponentConfig {
                name: component.to_string(),
                enabled,
            });
        }
    }

    /// Effective availability tier.
    #[must_use]
    pub fn availability(&self) -> AvailabilityType {
        self.availability_config.unwrap_or_default()
    }

    /// Pull policy override, if any.
    #[must_use]
    pub fn image_pull_policy(&self) -> Option<&str> {
        self.overrides
            .as_ref()
            .and_then(|o| o.image_pull_policy.as_deref())
    }
}

impl MultiClusterHub {
    fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations()
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Whether the pause annotation is set to `true` (case-insensitive).
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.annotation(ANNOTATION_PAUSE)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Image repository override from annotations.
    #[must_use]
    pub fn image_repository(&self) -> Option<&str> {
        self.annotation(ANNOTATION_IMAGE_REPOSITORY)
    }

    /// Name of the image overrides config map from annotations.
    #[must_use]
    pub fn image_overrides_configmap(&self) -> Option<&str> {
        self.annotation(ANNOTATION_IMAGE_OVERRIDES_CM)
    }

    /// Conditions recorded in status, or an empty slice.
    #[must_use]
    pub fn conditions(&self) -> &[HubCondition] {
        self.status.as_ref().map_or(&[], |s| s.conditions.as_slice())
    }
}

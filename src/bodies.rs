// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired bodies of the children the hub manages.
//!
//! Every factory is a pure function of the hub, the resolved image overrides,
//! the ingress domain and the platform version ([`RenderContext`]). The factories decide only what a
//! child should look like; whether it is created, patched or deleted is up to
//! the convergence primitives.

use crate::constants::{
    BACKUP_NAMESPACE, BASIC_REPLICAS, CERT_MANAGER_NAMESPACE, CLUSTER_SINGLETON_NAME,
    CONSOLE_PLUGIN_MIN_PLATFORM_VERSION, CONSOLE_PLUGIN_NAME, ENGINE_COMPONENT_CLUSTER_PROXY_ADDON,
    ENGINE_COMPONENT_CONSOLE, HA_REPLICAS, IMAGE_MANIFEST_CONFIGMAP_PREFIX, LOCAL_CLUSTER_NAME,
    MULTICLUSTER_ENGINE_NAME, MULTICLUSTER_ENGINE_NAMESPACE,
};
use crate::crd::{AvailabilityType, MultiClusterHub};
use crate::kinds;
use crate::labels::{
    ANNOTATION_ADOPTED, APP, HUB_COMPONENT, K8S_MANAGED_BY, LOCAL_CLUSTER, MANAGED_BY_HUB,
};
use crate::reconcilers::components::{COMPONENT_CLUSTER_PROXY_ADDON, COMPONENT_CONSOLE};
use crate::reconcilers::defaults::version_at_least;
use kube::api::{ApiResource, DynamicObject};
use kube::ResourceExt;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Name of the helm repository served by the repo component
pub const REPO_NAME: &str = "multiclusterhub-repo";

/// Name of the channel pointing at the helm repository
pub const CHANNEL_NAME: &str = "charts-v1";

/// Port the helm repository listens on
pub const REPO_PORT: u16 = 3000;

/// Image key of the helm repository
pub const REPO_IMAGE_KEY: &str = "multiclusterhub_repo";

/// Inputs shared by every body factory.
#[derive(Clone, Copy, Debug)]
pub struct RenderContext<'a> {
    pub hub: &'a MultiClusterHub,
    pub images: &'a BTreeMap<String, String>,
    pub ingress_domain: &'a str,
    pub platform_version: &'a str,
}

impl RenderContext<'_> {
    /// Namespace of the hub.
    #[must_use]
    pub fn namespace(&self) -> String {
        self.hub.namespace().unwrap_or_default()
    }

    fn replicas(&self) -> i32 {
        match self.hub.spec.availability() {
            AvailabilityType::High => HA_REPLICAS,
            AvailabilityType::Basic => BASIC_REPLICAS,
        }
    }

    fn image(&self, key: &str) -> String {
        self.images.get(key).cloned().unwrap_or_default()
    }

    fn pull_secrets(&self) -> Value {
        self.hub
            .spec
            .image_pull_secret
            .as_ref()
            .map_or_else(|| json!([]), |name| json!([{ "name": name }]))
    }
}

fn body(ar: &ApiResource, name: &str, namespace: Option<&str>, data: Value) -> DynamicObject {
    let obj = DynamicObject::new(name, ar).data(data);
    match namespace {
        Some(ns) => obj.within(ns),
        None => obj,
    }
}

fn with_component(mut obj: DynamicObject, component: &str) -> DynamicObject {
    let labels = obj.labels_mut();
    labels.insert(HUB_COMPONENT.to_string(), component.to_string());
    labels.insert(K8S_MANAGED_BY.to_string(), MANAGED_BY_HUB.to_string());
    obj
}

// ============================================================================
// Helm Repository
// ============================================================================

/// Deployment serving the hub helm charts.
#[must_use]
pub fn repo_deployment(ctx: &RenderContext<'_>, component: &str) -> DynamicObject {
    let mut container = json!({
        "name": REPO_NAME,
        "image": ctx.image(REPO_IMAGE_KEY),
        "ports": [{"containerPort": REPO_PORT, "protocol": "TCP"}],
        "env": [{"name": "POD_NAMESPACE", "value": ctx.namespace()}]
    });
    if let Some(policy) = ctx.hub.spec.image_pull_policy() {
        container["imagePullPolicy"] = json!(policy);
    }

    let mut pod_spec = json!({
        "serviceAccountName": REPO_NAME,
        "containers": [container],
        "imagePullSecrets": ctx.pull_secrets(),
    });
    if let Some(selector) = &ctx.hub.spec.node_selector {
        pod_spec["nodeSelector"] = json!(selector);
    }

    with_component(
        body(
            &kinds::deployment(),
            REPO_NAME,
            Some(&ctx.namespace()),
            json!({
                "spec": {
                    "replicas": ctx.replicas(),
                    "selector": {"matchLabels": {APP: REPO_NAME}},
                    "template": {
                        "metadata": {"labels": {APP: REPO_NAME}},
                        "spec": pod_spec
                    }
                }
            }),
        ),
        component,
    )
}

/// Service in front of the helm repository.
#[must_use]
pub fn repo_service(ctx: &RenderContext<'_>, component: &str) -> DynamicObject {
    with_component(
        body(
            &kinds::service(),
            REPO_NAME,
            Some(&ctx.namespace()),
            json!({
                "spec": {
                    "ports": [{"port": REPO_PORT, "targetPort": REPO_PORT, "protocol": "TCP"}],
                    "selector": {APP: REPO_NAME}
                }
            }),
        ),
        component,
    )
}

/// Channel through which subscriptions pull charts from the repository.
#[must_use]
pub fn repo_channel(ctx: &RenderContext<'_>, component: &str) -> DynamicObject {
    let namespace = ctx.namespace();
    with_component(
        body(
            &kinds::channel(),
            CHANNEL_NAME,
            Some(&namespace),
            json!({
                "spec": {
                    "type": "HelmRepo",
                    "pathname": format!(
                        "http://{REPO_NAME}.{namespace}.svc.cluster.local:{REPO_PORT}/charts"
                    )
                }
            }),
        ),
        component,
    )
}

// ============================================================================
// Chart Subscriptions
// ============================================================================

/// A helm chart installed through an application subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChartSubscription {
    /// Subscription name
    pub name: &'static str,
    /// Chart (package) name
    pub chart: &'static str,
    /// Install into the backup namespace instead of the hub namespace
    pub in_backup_namespace: bool,
    /// Image keys passed through to the chart
    pub image_keys: &'static [&'static str],
}

impl ChartSubscription {
    /// Namespace the subscription lives in.
    #[must_use]
    pub fn namespace(&self, hub_namespace: &str) -> String {
        if self.in_backup_namespace {
            BACKUP_NAMESPACE.to_string()
        } else {
            hub_namespace.to_string()
        }
    }
}

/// Application subscription installing `chart`.
#[must_use]
pub fn chart_subscription(
    ctx: &RenderContext<'_>,
    chart: &ChartSubscription,
    component: &str,
) -> DynamicObject {
    let hub_namespace = ctx.namespace();
    let spec = &ctx.hub.spec;

    let image_overrides: Map<String, Value> = chart
        .image_keys
        .iter()
        .filter_map(|key| ctx.images.get(*key).map(|v| ((*key).to_string(), json!(v))))
        .collect();

    let mut global = json!({
        "imageOverrides": image_overrides,
        "pullSecret": spec.image_pull_secret.clone().unwrap_or_default(),
    });
    if let Some(policy) = spec.image_pull_policy() {
        global["pullPolicy"] = json!(policy);
    }

    let mut hubconfig = json!({ "replicaCount": ctx.replicas() });
    if let Some(selector) = &spec.node_selector {
        hubconfig["nodeSelector"] = json!(selector);
    }

    let values = json!({
        "global": global,
        "hubconfig": hubconfig,
        "ingress": {
            "domain": ctx.ingress_domain,
            "sslCiphers": spec.ingress.ssl_ciphers,
        },
        "customCAConfigmap": spec.custom_ca_configmap.clone().unwrap_or_default(),
    });

    with_component(
        body(
            &kinds::app_subscription(),
            chart.name,
            Some(&chart.namespace(&hub_namespace)),
            json!({
                "spec": {
                    "channel": format!("{hub_namespace}/{CHANNEL_NAME}"),
                    "name": chart.chart,
                    "placement": {"local": true},
                    "packageOverrides": [{
                        "packageName": chart.chart,
                        "packageOverrides": [{"path": "spec", "value": values}]
                    }]
                }
            }),
        ),
        component,
    )
}

/// Transient namespace created for the backup component.
#[must_use]
pub fn backup_namespace(component: &str) -> DynamicObject {
    with_component(
        body(
            &kinds::namespace(),
            BACKUP_NAMESPACE,
            None,
            json!({}),
        ),
        component,
    )
}

// ============================================================================
// Engine, Self-Management and Console
// ============================================================================

/// `MultiClusterEngine` reflecting the hub settings.
#[must_use]
pub fn multicluster_engine(ctx: &RenderContext<'_>) -> DynamicObject {
    let spec = &ctx.hub.spec;
    let availability = match spec.availability() {
        AvailabilityType::High => "High",
        AvailabilityType::Basic => "Basic",
    };
    let mut engine_spec = json!({
        "availabilityConfig": availability,
        "targetNamespace": MULTICLUSTER_ENGINE_NAMESPACE,
    });
    if let Some(secret) = &spec.image_pull_secret {
        engine_spec["imagePullSecret"] = json!(secret);
    }
    if let Some(selector) = &spec.node_selector {
        engine_spec["nodeSelector"] = json!(selector);
    }
    engine_spec["overrides"] = engine_overrides(ctx);
    body(
        &kinds::multicluster_engine(),
        MULTICLUSTER_ENGINE_NAME,
        None,
        json!({ "spec": engine_spec }),
    )
}

/// Engine components that follow hub components. The engine console needs
/// dynamic plugin support from the platform.
fn engine_overrides(ctx: &RenderContext<'_>) -> Value {
    let spec = &ctx.hub.spec;
    let console = spec.is_enabled(COMPONENT_CONSOLE)
        && version_at_least(ctx.platform_version, CONSOLE_PLUGIN_MIN_PLATFORM_VERSION);
    let components = [
        (ENGINE_COMPONENT_CONSOLE, console),
        (
            ENGINE_COMPONENT_CLUSTER_PROXY_ADDON,
            spec.is_enabled(COMPONENT_CLUSTER_PROXY_ADDON),
        ),
    ]
    .map(|(name, enabled)| json!({ "name": name, "enabled": enabled }));

    let mut overrides = json!({ "components": components });
    if let Some(policy) = spec.image_pull_policy() {
        overrides["imagePullPolicy"] = json!(policy);
    }
    overrides
}

/// Adoption marker annotation stamped on a pre-existing engine.
#[must_use]
pub fn mark_adopted(mut engine: DynamicObject) -> DynamicObject {
    engine
        .annotations_mut()
        .insert(ANNOTATION_ADOPTED.to_string(), "true".to_string());
    engine
}

/// `ManagedCluster` that imports the hub into itself.
#[must_use]
pub fn local_cluster() -> DynamicObject {
    let mut obj = body(
        &kinds::managed_cluster(),
        LOCAL_CLUSTER_NAME,
        None,
        json!({ "spec": { "hubAcceptsClient": true } }),
    );
    obj.labels_mut()
        .insert(LOCAL_CLUSTER.to_string(), "true".to_string());
    obj
}

/// `ConsolePlugin` registering the hub views with the platform console.
#[must_use]
pub fn console_plugin(ctx: &RenderContext<'_>) -> DynamicObject {
    body(
        &kinds::console_plugin(),
        CONSOLE_PLUGIN_NAME,
        None,
        json!({
            "spec": {
                "displayName": "Multicluster hub",
                "backend": {
                    "type": "Service",
                    "service": {
                        "name": "console-chart-console-v2",
                        "namespace": ctx.namespace(),
                        "port": REPO_PORT,
                        "basePath": "/plugin/"
                    }
                }
            }
        }),
    )
}

/// Platform `Console` with `plugin` appended to the enabled plugin list.
///
/// Returns `None` when the plugin is already enabled.
#[must_use]
pub fn console_with_plugin(live_plugins: &[String], plugin: &str) -> Option<DynamicObject> {
    if live_plugins.iter().any(|p| p == plugin) {
        return None;
    }
    let mut plugins = live_plugins.to_vec();
    plugins.push(plugin.to_string());
    Some(body(
        &kinds::console(),
        CLUSTER_SINGLETON_NAME,
        None,
        json!({ "spec": { "plugins": plugins } }),
    ))
}

/// Platform `Console` with `plugin` removed, or `None` if it was not enabled.
#[must_use]
pub fn console_without_plugin(live_plugins: &[String], plugin: &str) -> Option<DynamicObject> {
    if !live_plugins.iter().any(|p| p == plugin) {
        return None;
    }
    let plugins: Vec<&String> = live_plugins.iter().filter(|p| *p != plugin).collect();
    Some(body(
        &kinds::console(),
        CLUSTER_SINGLETON_NAME,
        None,
        json!({ "spec": { "plugins": plugins } }),
    ))
}

// ============================================================================
// Image Manifest and Pull Secret
// ============================================================================

/// Config map persisting the resolved image overrides of `version`.
#[must_use]
pub fn image_manifest_configmap(
    hub_namespace: &str,
    version: &str,
    images: &BTreeMap<String, String>,
) -> DynamicObject {
    body(
        &kinds::config_map(),
        &format!("{IMAGE_MANIFEST_CONFIGMAP_PREFIX}{version}"),
        Some(hub_namespace),
        json!({ "data": images }),
    )
}

/// Copy of the pull secret kept in the certificate manager namespace.
#[must_use]
pub fn cert_manager_pull_secret(name: &str) -> DynamicObject {
    body(&kinds::secret(), name, Some(CERT_MANAGER_NAMESPACE), json!({}))
}

#[cfg(test)]
#[path = "bodies_tests.rs"]
mod bodies_tests;

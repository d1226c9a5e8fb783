// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The hub component table.
//!
//! Each [`ComponentDef`] names a component, its default enablement, the
//! function rendering its desired bodies and the deployments whose
//! availability decides its health. The orchestrator walks [`COMPONENTS`] in
//! order; nothing outside this table branches on a component name except the
//! console plugin registration.

use crate::bodies::{
    backup_namespace, chart_subscription, repo_channel, repo_deployment, repo_service,
    ChartSubscription, RenderContext, REPO_NAME,
};
use crate::constants::BACKUP_NAMESPACE;
use crate::crd::{ComponentHealth, ConditionStatus};
use crate::status_reasons::{REASON_ALL_COMPONENTS_HEALTHY, REASON_COMPONENTS_UNAVAILABLE};
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::Value;

pub const COMPONENT_REPO: &str = "multiclusterhub-repo";
pub const COMPONENT_MANAGEMENT_INGRESS: &str = "management-ingress";
pub const COMPONENT_CONSOLE: &str = "console";
pub const COMPONENT_INSIGHTS: &str = "insights";
pub const COMPONENT_GRC: &str = "grc";
pub const COMPONENT_CLUSTER_LIFECYCLE: &str = "cluster-lifecycle";
pub const COMPONENT_VOLSYNC: &str = "volsync";
pub const COMPONENT_SEARCH: &str = "search";
pub const COMPONENT_CLUSTER_BACKUP: &str = "cluster-backup";
pub const COMPONENT_CLUSTER_PROXY_ADDON: &str = "cluster-proxy-addon";

/// A deployment whose availability counts toward a component's health.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeploymentRef {
    pub name: &'static str,
    pub in_backup_namespace: bool,
}

impl DeploymentRef {
    const fn hub(name: &'static str) -> Self {
        Self {
            name,
            in_backup_namespace: false,
        }
    }

    const fn backup(name: &'static str) -> Self {
        Self {
            name,
            in_backup_namespace: true,
        }
    }

    /// Namespace the deployment runs in.
    #[must_use]
    pub fn namespace<'a>(&self, hub_namespace: &'a str) -> &'a str {
        if self.in_backup_namespace {
            BACKUP_NAMESPACE
        } else {
            hub_namespace
        }
    }
}

/// Renders the desired bodies of a component, in creation order.
pub type RenderFn = fn(&RenderContext<'_>, &ComponentDef) -> Vec<DynamicObject>;

/// One row of the component table.
#[derive(Clone, Copy, Debug)]
pub struct ComponentDef {
    pub name: &'static str,
    pub enabled_by_default: bool,
    /// Chart installed through an application subscription, if any
    pub chart: Option<ChartSubscription>,
    pub render: RenderFn,
    /// Deployments that must be available for the component to be healthy
    pub deployments: &'static [DeploymentRef],
}

impl ComponentDef {
    /// Desired bodies, in creation order.
    #[must_use]
    pub fn bodies(&self, ctx: &RenderContext<'_>) -> Vec<DynamicObject> {
        (self.render)(ctx, self)
    }
}

fn render_repo(ctx: &RenderContext<'_>, def: &ComponentDef) -> Vec<DynamicObject> {
    vec![
        repo_deployment(ctx, def.name),
        repo_service(ctx, def.name),
        repo_channel(ctx, def.name),
    ]
}

fn render_chart(ctx: &RenderContext<'_>, def: &ComponentDef) -> Vec<DynamicObject> {
    def.chart
        .iter()
        .map(|chart| chart_subscription(ctx, chart, def.name))
        .collect()
}

fn render_with_namespace(ctx: &RenderContext<'_>, def: &ComponentDef) -> Vec<DynamicObject> {
    let mut bodies = vec![backup_namespace(def.name)];
    bodies.extend(render_chart(ctx, def));
    bodies
}

const fn chart(
    name: &'static str,
    chart: &'static str,
    image_keys: &'static [&'static str],
) -> Option<ChartSubscription> {
    Some(ChartSubscription {
        name,
        chart,
        in_backup_namespace: false,
        image_keys,
    })
}

/// Every hub component, in convergence order.
pub static COMPONENTS: &[ComponentDef] = &[
    ComponentDef {
        name: COMPONENT_REPO,
        enabled_by_default: true,
        chart: None,
        render: render_repo,
        deployments: &[DeploymentRef::hub(REPO_NAME)],
    },
    ComponentDef {
        name: COMPONENT_MANAGEMENT_INGRESS,
        enabled_by_default: true,
        chart: chart(
            "management-ingress-sub",
            "management-ingress",
            &["management_ingress", "oauth_proxy"],
        ),
        render: render_chart,
        deployments: &[DeploymentRef::hub("management-ingress")],
    },
    ComponentDef {
        name: COMPONENT_CONSOLE,
        enabled_by_default: true,
        chart: chart("console-chart-sub", "console-chart", &["console"]),
        render: render_chart,
        deployments: &[DeploymentRef::hub("console-chart-console-v2")],
    },
    ComponentDef {
        name: COMPONENT_INSIGHTS,
        enabled_by_default: true,
        chart: chart(
            "insights-chart-sub",
            "insights-chart",
            &["insights_client", "insights_metrics"],
        ),
        render: render_chart,
        deployments: &[
            DeploymentRef::hub("insights-client"),
            DeploymentRef::hub("insights-metrics"),
        ],
    },
    ComponentDef {
        name: COMPONENT_GRC,
        enabled_by_default: true,
        chart: chart(
            "grc-sub",
            "grc",
            &["grc_policy_propagator", "grc_policy_addon_controller"],
        ),
        render: render_chart,
        deployments: &[
            DeploymentRef::hub("grc-policy-propagator"),
            DeploymentRef::hub("grc-policy-addon-controller"),
        ],
    },
    ComponentDef {
        name: COMPONENT_CLUSTER_LIFECYCLE,
        enabled_by_default: true,
        chart: chart(
            "cluster-lifecycle-sub",
            "cluster-lifecycle",
            &["klusterlet_addon_controller"],
        ),
        render: render_chart,
        deployments: &[DeploymentRef::hub("klusterlet-addon-controller-v2")],
    },
    ComponentDef {
        name: COMPONENT_VOLSYNC,
        enabled_by_default: true,
        chart: chart(
            "volsync-addon-controller-sub",
            "volsync-addon-controller",
            &["volsync_addon_controller"],
        ),
        render: render_chart,
        deployments: &[DeploymentRef::hub("volsync-addon-controller")],
    },
    ComponentDef {
        name: COMPONENT_SEARCH,
        enabled_by_default: true,
        chart: chart(
            "search-prod-sub",
            "search-prod",
            &["search_api", "search_collector", "search_aggregator"],
        ),
        render: render_chart,
        deployments: &[
            DeploymentRef::hub("search-api"),
            DeploymentRef::hub("search-aggregator"),
        ],
    },
    ComponentDef {
        name: COMPONENT_CLUSTER_BACKUP,
        enabled_by_default: false,
        chart: Some(ChartSubscription {
            name: "cluster-backup-chart-sub",
            chart: "cluster-backup-chart",
            in_backup_namespace: true,
            image_keys: &["cluster_backup_controller", "velero"],
        }),
        render: render_with_namespace,
        deployments: &[DeploymentRef::backup("cluster-backup-chart-clusterbackup")],
    },
    ComponentDef {
        name: COMPONENT_CLUSTER_PROXY_ADDON,
        enabled_by_default: true,
        chart: chart(
            "cluster-proxy-addon-sub",
            "cluster-proxy-addon",
            &["cluster_proxy_addon", "cluster_proxy"],
        ),
        render: render_chart,
        deployments: &[DeploymentRef::hub("cluster-proxy-addon-manager")],
    },
];

/// Look up a component by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static ComponentDef> {
    COMPONENTS.iter().find(|c| c.name == name)
}

/// Namespaces the orchestrator snapshots deployments and helm releases from.
#[must_use]
pub fn tracked_namespaces(hub_namespace: &str) -> Vec<String> {
    vec![hub_namespace.to_string(), BACKUP_NAMESPACE.to_string()]
}

/// Namespaces created on demand for optional components.
#[must_use]
pub fn transient_namespaces() -> Vec<&'static str> {
    vec![BACKUP_NAMESPACE]
}

fn is_available(deployment: &DynamicObject) -> bool {
    let status = deployment.data.get("status");
    let available_condition = status
        .and_then(|s| s.get("conditions"))
        .and_then(Value::as_array)
        .is_some_and(|conds| {
            conds.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some("Available")
                    && c.get("status").and_then(Value::as_str) == Some("True")
            })
        });
    let available_replicas = status
        .and_then(|s| s.get("availableReplicas"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    available_condition && available_replicas > 0
}

/// Health of `def` given the snapshot of tracked deployments.
#[must_use]
pub fn component_health(
    def: &ComponentDef,
    deployments: &[DynamicObject],
    hub_namespace: &str,
) -> ComponentHealth {
    let mut missing = Vec::new();
    let mut unavailable = Vec::new();
    for expected in def.deployments {
        let namespace = expected.namespace(hub_namespace);
        let live = deployments.iter().find(|d| {
            d.name_any() == expected.name && d.namespace().as_deref() == Some(namespace)
        });
        match live {
            None => missing.push(expected.name),
            Some(d) if !is_available(d) => unavailable.push(expected.name),
            Some(_) => {}
        }
    }

    if missing.is_empty() && unavailable.is_empty() {
        return ComponentHealth {
            status: ConditionStatus::True,
            reason: Some(REASON_ALL_COMPONENTS_HEALTHY.to_string()),
            message: None,
        };
    }

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing: {}", missing.join(", ")));
    }
    if !unavailable.is_empty() {
        parts.push(format!("unavailable: {}", unavailable.join(", ")));
    }
    ComponentHealth {
        status: ConditionStatus::False,
        reason: Some(REASON_COMPONENTS_UNAVAILABLE.to_string()),
        message: Some(parts.join("; ")),
    }
}

#[cfg(test)]
#[path = "components_tests.rs"]
mod components_tests;

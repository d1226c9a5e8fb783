// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management and the ordered hub teardown pipeline.
//!
//! A hub carries [`HUB_FINALIZER`] for its whole life. When the hub is
//! deleted, [`TeardownPipeline::run`] executes every [`TeardownStage`] in
//! order. The first failing stage aborts the run and the finalizer stays in
//! place; the next pass starts again from the first stage. Every stage treats
//! an already absent object as done, so re-running completed stages is cheap.
//!
//! # Example
//!
//! ```rust,ignore
//! use hub_operator::reconcilers::finalizers::{remove_finalizer, TeardownContext, TeardownPipeline};
//!
//! let teardown = TeardownContext { store, hub: &hub, platform_version: "4.12.0" };
//! TeardownPipeline::standard().run(&teardown).await?;
//! remove_finalizer(store, &hub).await?;
//! ```

use crate::bodies::{cert_manager_pull_secret, console_without_plugin, local_cluster};
use crate::config::installer_selector;
use crate::constants::{
    CLUSTER_SINGLETON_NAME, CONSOLE_PLUGIN_MIN_PLATFORM_VERSION, CONSOLE_PLUGIN_NAME,
    HUB_FINALIZER, MULTICLUSTER_ENGINE_NAME,
};
use crate::crd::MultiClusterHub;
use crate::errors::{HubError, HubResult};
use crate::kinds;
use crate::labels::{ANNOTATION_ADOPTED, INSTALLER_NAME, INSTALLER_NAMESPACE};
use crate::metrics::record_teardown_stage;
use crate::reconcilers::components::transient_namespaces;
use crate::reconcilers::defaults::version_at_least;
use crate::reconcilers::resources::{ensure_absent, has_identity_of};
use crate::store::{display_name, ObjectStore};
use kube::api::{ApiResource, DynamicObject};
use kube::{Resource, ResourceExt};
use serde_json::{json, Value};
use tracing::{debug, error, info};

// ============================================================================
// Finalizer
// ============================================================================

fn has_finalizer(hub: &MultiClusterHub) -> bool {
    hub.finalizers().iter().any(|f| f == HUB_FINALIZER)
}

/// Add [`HUB_FINALIZER`] to the hub if missing; returns whether it was added.
///
/// # Errors
///
/// Returns the store error of the metadata patch.
pub async fn add_finalizer(store: &dyn ObjectStore, hub: &mut MultiClusterHub) -> HubResult<bool> {
    if has_finalizer(hub) {
        return Ok(false);
    }

    let namespace = hub.namespace().unwrap_or_default();
    let name = hub.name_any();
    info!("Adding finalizer {} to MultiClusterHub {}/{}", HUB_FINALIZER, namespace, name);

    let mut finalizers = hub.finalizers().to_vec();
    finalizers.push(HUB_FINALIZER.to_string());
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    store
        .patch(&kinds::multicluster_hub(), Some(&namespace), &name, &patch)
        .await?;
    hub.meta_mut().finalizers = Some(finalizers);
    Ok(true)
}

/// Remove [`HUB_FINALIZER`] from the hub; returns whether it was removed.
///
/// A hub that is already gone counts as done.
///
/// # Errors
///
/// Returns the store error of the metadata patch.
pub async fn remove_finalizer(store: &dyn ObjectStore, hub: &MultiClusterHub) -> HubResult<bool> {
    if !has_finalizer(hub) {
        return Ok(false);
    }

    let namespace = hub.namespace().unwrap_or_default();
    let name = hub.name_any();
    let finalizers: Vec<&String> = hub
        .finalizers()
        .iter()
        .filter(|f| *f != HUB_FINALIZER)
        .collect();
    let patch = json!({ "metadata": { "finalizers": finalizers } });

    match store
        .patch(&kinds::multicluster_hub(), Some(&namespace), &name, &patch)
        .await
    {
        Ok(_) => {
            info!(
                "Removed finalizer {} from MultiClusterHub {}/{}",
                HUB_FINALIZER, namespace, name
            );
            Ok(true)
        }
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Teardown Stages
// ============================================================================

/// Inputs of a teardown run.
#[derive(Clone, Copy)]
pub struct TeardownContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub hub: &'a MultiClusterHub,
    /// Platform version; console plugin removal is skipped when unsupported
    pub platform_version: &'a str,
}

impl TeardownContext<'_> {
    fn selector(&self) -> String {
        installer_selector(
            &self.hub.name_any(),
            &self.hub.namespace().unwrap_or_default(),
        )
    }
}

/// One step of the hub teardown, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownStage {
    ConsolePlugin,
    SelfManagement,
    Subscriptions,
    Namespaces,
    Foundation,
    ClusterRoles,
    ClusterRoleBindings,
    MulticlusterEngine,
    Crds,
    PullSecret,
    AdoptedResources,
}

impl TeardownStage {
    /// Every stage, in execution order.
    pub const ALL: [Self; 11] = [
        Self::ConsolePlugin,
        Self::SelfManagement,
        Self::Subscriptions,
        Self::Namespaces,
        Self::Foundation,
        Self::ClusterRoles,
        Self::ClusterRoleBindings,
        Self::MulticlusterEngine,
        Self::Crds,
        Self::PullSecret,
        Self::AdoptedResources,
    ];

    /// Stable stage name used in logs and metrics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ConsolePlugin => "console-plugin",
            Self::SelfManagement => "self-management",
            Self::Subscriptions => "subscriptions",
            Self::Namespaces => "namespaces",
            Self::Foundation => "foundation",
            Self::ClusterRoles => "cluster-roles",
            Self::ClusterRoleBindings => "cluster-role-bindings",
            Self::MulticlusterEngine => "multicluster-engine",
            Self::Crds => "crds",
            Self::PullSecret => "pull-secret",
            Self::AdoptedResources => "adopted-resources",
        }
    }

    /// Run the stage once.
    ///
    /// # Errors
    ///
    /// Returns store errors, or [`HubError::Waiting`] while dependents remain.
    pub async fn run(self, ctx: &TeardownContext<'_>) -> HubResult<()> {
        match self {
            Self::ConsolePlugin => remove_console_plugin(ctx).await,
            Self::SelfManagement => ensure_absent(ctx.store, &local_cluster()).await.map(drop),
            Self::Subscriptions => remove_subscriptions(ctx, self.name()).await,
            Self::Namespaces => remove_namespaces(ctx, self.name()).await,
            Self::Foundation => {
                for ar in [
                    kinds::deployment(),
                    kinds::service(),
                    kinds::api_service(),
                    kinds::mutating_webhook(),
                    kinds::validating_webhook(),
                ] {
                    delete_labelled(ctx, &ar).await?;
                }
                Ok(())
            }
            Self::ClusterRoles => delete_labelled(ctx, &kinds::cluster_role()).await,
            Self::ClusterRoleBindings => {
                delete_labelled(ctx, &kinds::cluster_role_binding()).await
            }
            Self::MulticlusterEngine => remove_engine(ctx, self.name()).await,
            Self::Crds => delete_labelled(ctx, &kinds::crd()).await,
            Self::PullSecret => remove_pull_secret(ctx).await,
            Self::AdoptedResources => release_adopted(ctx).await,
        }
    }
}

async fn delete_labelled(ctx: &TeardownContext<'_>, ar: &ApiResource) -> HubResult<()> {
    let objects = ctx.store.list(ar, None, Some(&ctx.selector())).await?;
    for obj in objects {
        let namespace = obj.namespace();
        let name = obj.name_any();
        match ctx.store.delete(ar, namespace.as_deref(), &name).await {
            Ok(()) => info!("Deleted {} {}", ar.kind, display_name(namespace.as_deref(), &name)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn remove_console_plugin(ctx: &TeardownContext<'_>) -> HubResult<()> {
    if !version_at_least(ctx.platform_version, CONSOLE_PLUGIN_MIN_PLATFORM_VERSION) {
        debug!(
            "Platform version {:?} does not support console plugins, skipping",
            ctx.platform_version
        );
        return Ok(());
    }

    if let Some(console) = ctx
        .store
        .get(&kinds::console(), None, CLUSTER_SINGLETON_NAME)
        .await?
    {
        let plugins = plugin_list(&console);
        if let Some(updated) = console_without_plugin(&plugins, CONSOLE_PLUGIN_NAME) {
            let patch = json!({ "spec": { "plugins": updated.data["spec"]["plugins"] } });
            ctx.store
                .patch(&kinds::console(), None, CLUSTER_SINGLETON_NAME, &patch)
                .await?;
            info!("Disabled console plugin {}", CONSOLE_PLUGIN_NAME);
        }
    }

    let plugin = DynamicObject::new(CONSOLE_PLUGIN_NAME, &kinds::console_plugin());
    ensure_absent(ctx.store, &plugin).await.map(drop)
}

/// Plugins enabled on the platform console.
#[must_use]
pub fn plugin_list(console: &DynamicObject) -> Vec<String> {
    console
        .data
        .pointer("/spec/plugins")
        .and_then(Value::as_array)
        .map(|plugins| {
            plugins
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

async fn remove_subscriptions(ctx: &TeardownContext<'_>, stage: &'static str) -> HubResult<()> {
    delete_labelled(ctx, &kinds::app_subscription()).await?;

    let releases = ctx
        .store
        .list(&kinds::helm_release(), None, Some(&ctx.selector()))
        .await?;
    if !releases.is_empty() {
        return Err(HubError::Waiting {
            stage,
            message: format!("{} helm release(s) still present", releases.len()),
        });
    }
    Ok(())
}

async fn remove_namespaces(ctx: &TeardownContext<'_>, stage: &'static str) -> HubResult<()> {
    let ar = kinds::namespace();
    let mut remaining = Vec::new();
    for name in transient_namespaces() {
        let Some(live) = ctx.store.get(&ar, None, name).await? else {
            continue;
        };
        if !has_identity_of(&live, ctx.hub) {
            debug!("Namespace {} is not owned by this hub, leaving it", name);
            continue;
        }
        ensure_absent(ctx.store, &live).await?;
        if ctx.store.get(&ar, None, name).await?.is_some() {
            remaining.push(name);
        }
    }

    if remaining.is_empty() {
        Ok(())
    } else {
        Err(HubError::Waiting {
            stage,
            message: format!("namespace(s) still terminating: {}", remaining.join(", ")),
        })
    }
}

fn is_adopted(obj: &DynamicObject) -> bool {
    obj.annotations()
        .get(ANNOTATION_ADOPTED)
        .is_some_and(|v| v == "true")
}

async fn remove_engine(ctx: &TeardownContext<'_>, stage: &'static str) -> HubResult<()> {
    let ar = kinds::multicluster_engine();
    let Some(engine) = ctx.store.get(&ar, None, MULTICLUSTER_ENGINE_NAME).await? else {
        return Ok(());
    };
    if is_adopted(&engine) || !has_identity_of(&engine, ctx.hub) {
        debug!("MultiClusterEngine {} was not created by this hub, leaving it", MULTICLUSTER_ENGINE_NAME);
        return Ok(());
    }

    ensure_absent(ctx.store, &engine).await?;
    if ctx
        .store
        .get(&ar, None, MULTICLUSTER_ENGINE_NAME)
        .await?
        .is_some()
    {
        return Err(HubError::Waiting {
            stage,
            message: format!("MultiClusterEngine {MULTICLUSTER_ENGINE_NAME} still exists"),
        });
    }
    Ok(())
}

async fn remove_pull_secret(ctx: &TeardownContext<'_>) -> HubResult<()> {
    let spec = &ctx.hub.spec;
    if !spec.separate_certificate_management {
        return Ok(());
    }
    let Some(secret) = spec.image_pull_secret.as_deref() else {
        return Ok(());
    };
    ensure_absent(ctx.store, &cert_manager_pull_secret(secret))
        .await
        .map(drop)
}

async fn release_adopted(ctx: &TeardownContext<'_>) -> HubResult<()> {
    let ar = kinds::multicluster_engine();
    let engines = ctx.store.list(&ar, None, Some(&ctx.selector())).await?;
    for engine in engines.iter().filter(|e| is_adopted(e)) {
        let name = engine.name_any();
        let patch = json!({
            "metadata": {
                "labels": { INSTALLER_NAME: null, INSTALLER_NAMESPACE: null },
                "annotations": { ANNOTATION_ADOPTED: null }
            }
        });
        match ctx.store.patch(&ar, None, &name, &patch).await {
            Ok(_) => info!("Released adopted MultiClusterEngine {}", name),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

// ============================================================================
// Pipeline
// ============================================================================

/// Ordered, fail-fast list of teardown stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeardownPipeline {
    stages: Vec<TeardownStage>,
}

impl TeardownPipeline {
    /// Pipeline running every stage in [`TeardownStage::ALL`] order.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            stages: TeardownStage::ALL.to_vec(),
        }
    }

    /// Stage names, in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Teardown`] naming the failing stage.
    pub async fn run(&self, ctx: &TeardownContext<'_>) -> HubResult<()> {
        let hub_name = display_name(ctx.hub.namespace().as_deref(), &ctx.hub.name_any());
        for stage in &self.stages {
            debug!("Running teardown stage {} for MultiClusterHub {}", stage.name(), hub_name);
            match stage.run(ctx).await {
                Ok(()) => record_teardown_stage(stage.name(), true),
                Err(e) => {
                    record_teardown_stage(stage.name(), false);
                    error!(
                        "Teardown stage {} failed for MultiClusterHub {}: {}",
                        stage.name(),
                        hub_name,
                        e
                    );
                    return Err(HubError::Teardown {
                        stage: stage.name(),
                        source: Box::new(e),
                    });
                }
            }
        }
        info!("Teardown complete for MultiClusterHub {}", hub_name);
        Ok(())
    }
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;

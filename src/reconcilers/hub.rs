// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `MultiClusterHub` reconciliation logic.
//!
//! A pass fetches the hub, snapshots the related live state and then runs
//! either the teardown pipeline (hub being deleted) or the ordered convergence
//! sequence. The status sync runs after either branch, whatever the branch
//! returned, and its outcome is merged with the branch outcome.
//!
//! Every step is idempotent and keeps no memory between passes other than the
//! hub's stored spec and status (plus the memoized values in
//! [`CacheSpec`]). A pass ends at the first step that returns anything other
//! than [`Outcome::Continue`].

use crate::bodies::{
    console_plugin, console_with_plugin, image_manifest_configmap, local_cluster, mark_adopted,
    multicluster_engine, RenderContext,
};
use crate::config::installer_selector;
use crate::constants::{
    CLUSTER_SINGLETON_NAME, CONSOLE_PLUGIN_MIN_PLATFORM_VERSION, CONSOLE_PLUGIN_NAME,
    ENV_CRDS_PATH, ENV_TEMPLATES_PATH, HUB_FINALIZER, MULTICLUSTER_ENGINE_NAME,
    TEMPLATES_BASE_DIR, TEMPLATES_KIND,
};
use crate::context::{CacheSpec, Context};
use crate::crd::{
    ComponentHealth, ConditionStatus, ConditionType, MultiClusterHub, MultiClusterHubSpec,
    MultiClusterHubStatus,
};
use crate::errors::{HubError, HubResult};
use crate::kinds;
use crate::labels::HUB_COMPONENT;
use crate::manifests::{load_crds, load_templates};
use crate::metrics::record_component_health;
use crate::reconcilers::components::{
    component_health, tracked_namespaces, ComponentDef, COMPONENTS, COMPONENT_CONSOLE,
};
use crate::reconcilers::defaults::{apply_defaults, version_at_least};
use crate::reconcilers::finalizers::{
    add_finalizer, plugin_list, remove_finalizer, TeardownContext, TeardownPipeline,
};
use crate::reconcilers::overrides::{env_image_overrides, resolve_image_overrides};
use crate::reconcilers::resources::{
    ensure_absent, ensure_present, ensure_present_with, has_identity_of, stamp_identity_labels,
};
use crate::reconcilers::status::{find_condition, remove_condition, set_condition, HubStatusUpdater};
use crate::reconcilers::validate::ADOPTION_PATHS;
use crate::status_reasons::{
    PHASE_INSTALLING, PHASE_PAUSED, PHASE_PENDING, PHASE_RUNNING, PHASE_UNINSTALLING,
    PHASE_UPDATING, PHASE_UPDATING_BLOCKED, REASON_ALL_COMPONENTS_HEALTHY,
    REASON_COMPONENTS_UNAVAILABLE, REASON_CRD_RENDER_FAILURE, REASON_DELETION_TIMESTAMP_PRESENT,
    REASON_DEPLOY_FAILURE, REASON_PAUSED, REASON_PULL_SECRET_MISSING, REASON_RESOURCE_BLOCKED,
    REASON_RESOURCE_RENDER_FAILURE, REASON_RESUMED,
};
use crate::store::{display_name, ObjectStore};
use kube::api::DynamicObject;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of a step or of a whole pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to wait for; move on
    Continue,
    /// Run another pass right away
    Requeue,
    /// Run another pass after the delay
    RequeueAfter(Duration),
    /// Stop the pass; nothing to requeue
    Halt,
}

impl Outcome {
    /// Whether the pass may move on to the next step.
    #[must_use]
    pub fn is_continue(self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Controller action for the outcome of a finished pass.
    #[must_use]
    pub fn action(self) -> Action {
        match self {
            Self::Continue | Self::Halt => Action::await_change(),
            Self::Requeue => Action::requeue(Duration::ZERO),
            Self::RequeueAfter(delay) => Action::requeue(delay),
        }
    }
}

/// Merge the outcome of the convergence or teardown branch with the status sync.
///
/// A branch that ended without asking for a requeue takes the status outcome.
/// A branch error wins over a status error.
///
/// # Errors
///
/// Returns the branch error, or else the status error.
pub fn merge_outcomes(pass: HubResult<Outcome>, status: HubResult<Outcome>) -> HubResult<Outcome> {
    match (pass, status) {
        (Err(e), Err(status_err)) => {
            warn!("Dropping status sync error in favour of pass error: {status_err}");
            Err(e)
        }
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Ok(Outcome::Continue | Outcome::Halt), Ok(status)) => Ok(status),
        (Ok(pass), Ok(_)) => Ok(pass),
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Live state read once at the start of a pass.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Deployments in the tracked namespaces
    pub deployments: Vec<DynamicObject>,
    /// Helm releases in the tracked namespaces
    pub helm_releases: Vec<DynamicObject>,
    /// Every `MultiClusterEngine`
    pub engines: Vec<DynamicObject>,
}

impl Snapshot {
    /// Read the snapshot for a hub in `hub_namespace`.
    ///
    /// # Errors
    ///
    /// Returns the store error of the first failing list.
    pub async fn capture(store: &dyn ObjectStore, hub_namespace: &str) -> HubResult<Self> {
        let mut snapshot = Self::default();
        for namespace in tracked_namespaces(hub_namespace) {
            snapshot.deployments.extend(
                store
                    .list(&kinds::deployment(), Some(&namespace), None)
                    .await?,
            );
            snapshot.helm_releases.extend(
                store
                    .list(&kinds::helm_release(), Some(&namespace), None)
                    .await?,
            );
        }
        snapshot.engines = store.list(&kinds::multicluster_engine(), None, None).await?;
        Ok(snapshot)
    }
}

/// Health of every enabled component, keyed by name.
#[must_use]
pub fn enabled_component_health(
    hub: &MultiClusterHub,
    snapshot: &Snapshot,
) -> BTreeMap<String, ComponentHealth> {
    let namespace = hub.namespace().unwrap_or_default();
    COMPONENTS
        .iter()
        .filter(|def| hub.spec.is_enabled(def.name))
        .map(|def| {
            (
                def.name.to_string(),
                component_health(def, &snapshot.deployments, &namespace),
            )
        })
        .collect()
}

fn all_healthy(health: &BTreeMap<String, ComponentHealth>) -> bool {
    health.values().all(|h| h.status == ConditionStatus::True)
}

// ============================================================================
// Hub (de)serialization
// ============================================================================

/// Typed view of a hub read through the object store.
///
/// # Errors
///
/// Returns a serialization error if the object does not match the schema.
pub fn hub_from_object(obj: &DynamicObject) -> HubResult<MultiClusterHub> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// Merge patch persisting a defaulted spec.
///
/// Deprecated toggles consumed by defaulting are cleared explicitly.
///
/// # Errors
///
/// Returns a serialization error if the spec cannot be serialized.
pub fn spec_patch(spec: &MultiClusterHubSpec) -> HubResult<Value> {
    let mut value = serde_json::to_value(spec)?;
    for deprecated in ["enableClusterBackup", "enableClusterProxyAddon"] {
        if value.get(deprecated).is_none() {
            value[deprecated] = Value::Null;
        }
    }
    Ok(json!({ "spec": value }))
}

// ============================================================================
// Entry Point
// ============================================================================

/// Reconciles the `MultiClusterHub` identified by `namespace`/`name`.
///
/// This function:
/// 1. Fetches the hub; a missing hub ends reconciliation without a requeue
/// 2. Snapshots deployments, helm releases and engines
/// 3. Runs the teardown pipeline or the convergence sequence
/// 4. Syncs the hub status, whatever step 3 returned
///
/// # Arguments
///
/// * `ctx` - Controller context with the object store, configuration and cache
/// * `namespace` - Namespace of the hub
/// * `name` - Name of the hub
///
/// # Returns
///
/// The merged [`Outcome`] of the pass and the status sync.
///
/// # Errors
///
/// Returns an error if a step fails or the status cannot be persisted.
pub async fn reconcile_hub(ctx: &Context, namespace: &str, name: &str) -> HubResult<Outcome> {
    let store = ctx.store.as_ref();

    let Some(obj) = store
        .get(&kinds::multicluster_hub(), Some(namespace), name)
        .await?
    else {
        debug!("MultiClusterHub {}/{} not found, nothing to do", namespace, name);
        return Ok(Outcome::Continue);
    };
    let hub = hub_from_object(&obj)?;

    info!("Reconciling MultiClusterHub: {}/{}", namespace, name);
    debug!(
        namespace = %namespace,
        name = %name,
        generation = ?hub.metadata.generation,
        "Starting MultiClusterHub reconciliation"
    );

    let mut cache = ctx.cache.lock().await;
    let snapshot = Snapshot::capture(store, namespace).await?;

    let mut pass = Pass {
        ctx,
        store,
        updater: HubStatusUpdater::new(&hub),
        status: hub.status.clone().unwrap_or_default(),
        hub,
        snapshot,
        cache: &mut *cache,
    };

    let result = if pass.hub.metadata.deletion_timestamp.is_some() {
        pass.teardown().await
    } else {
        pass.converge().await
    };
    let result = result.inspect_err(|e| pass.record_failure(e));

    let status = pass.sync_status().await;
    merge_outcomes(result, status)
}

// ============================================================================
// Pass
// ============================================================================

struct Pass<'a> {
    ctx: &'a Context,
    store: &'a dyn ObjectStore,
    hub: MultiClusterHub,
    updater: HubStatusUpdater,
    status: MultiClusterHubStatus,
    snapshot: Snapshot,
    cache: &'a mut CacheSpec,
}

impl Pass<'_> {
    fn namespace(&self) -> String {
        self.hub.namespace().unwrap_or_default()
    }

    fn display(&self) -> String {
        display_name(self.hub.namespace().as_deref(), &self.hub.name_any())
    }

    fn resync(&self) -> Outcome {
        Outcome::RequeueAfter(self.ctx.config.resync())
    }

    fn version(&self) -> &str {
        &self.ctx.config.operator_version
    }

    /// Permanent failures become `Progressing=False/<reason>`.
    fn record_failure(&mut self, err: &HubError) {
        if let Some(reason) = err.condition_reason() {
            error!("MultiClusterHub {} failed: {}", self.display(), err);
            set_condition(
                &mut self.status.conditions,
                ConditionType::Progressing,
                ConditionStatus::False,
                reason,
                &err.to_string(),
            );
        } else {
            warn!("MultiClusterHub {} pass ended with error: {}", self.display(), err);
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    async fn teardown(&mut self) -> HubResult<Outcome> {
        set_condition(
            &mut self.status.conditions,
            ConditionType::Terminating,
            ConditionStatus::True,
            REASON_DELETION_TIMESTAMP_PRESENT,
            "the hub is being deleted",
        );

        if !self.hub.finalizers().iter().any(|f| f == HUB_FINALIZER) {
            debug!("MultiClusterHub {} has no finalizer, nothing to tear down", self.display());
            return Ok(Outcome::Halt);
        }

        self.discover_platform_version().await?;

        let teardown = TeardownContext {
            store: self.store,
            hub: &self.hub,
            platform_version: &self.cache.platform_version,
        };
        if let Err(e) = TeardownPipeline::standard().run(&teardown).await {
            warn!(
                "Teardown of MultiClusterHub {} incomplete, retrying: {}",
                self.display(),
                e
            );
            return Ok(self.resync());
        }

        remove_finalizer(self.store, &self.hub).await?;
        Ok(Outcome::Halt)
    }

    // ------------------------------------------------------------------------
    // Convergence
    // ------------------------------------------------------------------------

    async fn converge(&mut self) -> HubResult<Outcome> {
        // Initializing -> Converging
        if add_finalizer(self.store, &mut self.hub).await? {
            debug!("Finalizer added to MultiClusterHub {}", self.display());
        }

        macro_rules! step {
            ($e:expr) => {
                let outcome = $e;
                if !outcome.is_continue() {
                    return Ok(outcome);
                }
            };
        }

        step!(self.apply_defaults().await?);
        step!(self.resolve_images().await?);
        self.persist_image_manifest().await?;
        step!(self.migrate_self_management().await);
        self.adopt_helm_deployments().await?;
        step!(self.pause_gate());
        step!(self.compatibility_guards().await?);
        step!(self.check_dependency().await?);
        self.install_crds().await?;
        self.check_pull_secret().await?;
        step!(self.converge_components().await?);
        step!(self.converge_engine().await?);
        self.discover_ingress_domain().await?;
        self.install_templates().await?;
        self.converge_self_registration().await?;
        self.finish_when_healthy().await?;

        Ok(Outcome::Continue)
    }

    /// Step 1: defaulting and platform discovery.
    async fn apply_defaults(&mut self) -> HubResult<Outcome> {
        self.discover_platform_version().await?;

        let mut defaulted = self.hub.clone();
        if !apply_defaults(&mut defaulted.spec) {
            return Ok(Outcome::Continue);
        }

        info!("Persisting defaulted spec of MultiClusterHub {}", self.display());
        let namespace = self.namespace();
        self.store
            .patch(
                &kinds::multicluster_hub(),
                Some(&namespace),
                &self.hub.name_any(),
                &spec_patch(&defaulted.spec)?,
            )
            .await?;
        self.hub = defaulted;
        Ok(Outcome::Requeue)
    }

    async fn discover_platform_version(&mut self) -> HubResult<()> {
        if self.ctx.config.unit_test || !self.cache.platform_version.is_empty() {
            return Ok(());
        }
        let Some(version) = self
            .store
            .get(&kinds::cluster_version(), None, "version")
            .await?
        else {
            debug!("No ClusterVersion found, platform version unknown");
            return Ok(());
        };
        let discovered = version
            .data
            .pointer("/status/desired/version")
            .or_else(|| version.data.pointer("/status/history/0/version"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !discovered.is_empty() {
            info!("Discovered platform version {}", discovered);
            self.cache.platform_version = discovered.to_string();
        }
        Ok(())
    }

    /// Step 2: image overrides.
    async fn resolve_images(&mut self) -> HubResult<Outcome> {
        let images = resolve_image_overrides(
            self.store,
            self.ctx.manifests.as_ref(),
            &self.ctx.config.manifests_path,
            &self.ctx.config.operator_version,
            &self.cache.platform_version,
            &self.hub,
            env_image_overrides(std::env::vars()),
        )
        .await?;

        self.cache.image_overrides = images;
        self.cache.manifest_version = self.ctx.config.operator_version.clone();
        self.cache.image_repository = self.hub.image_repository().unwrap_or_default().to_string();
        self.cache.image_overrides_cm = self
            .hub
            .image_overrides_configmap()
            .unwrap_or_default()
            .to_string();
        Ok(Outcome::Continue)
    }

    /// Step 3: persist the resolved overrides.
    async fn persist_image_manifest(&mut self) -> HubResult<()> {
        let cm = image_manifest_configmap(
            &self.namespace(),
            &self.cache.manifest_version,
            &self.cache.image_overrides,
        );
        ensure_present(self.store, &self.hub, &mut self.status.conditions, &cm).await?;
        Ok(())
    }

    /// Step 4: version-gated removal of retired self-management resources.
    async fn migrate_self_management(&mut self) -> Outcome {
        let Some(migration) = &self.ctx.config.self_management_migration else {
            return Outcome::Continue;
        };
        let current = self.status.current_version.as_deref().unwrap_or_default();
        if current.is_empty() || !current.starts_with(&migration.version_prefix) {
            return Outcome::Continue;
        }

        let namespace = self.namespace();
        for retired in &migration.retired {
            if let Err(e) = ensure_absent(self.store, &retired.body(&namespace)).await {
                warn!(
                    "Self-management migration of {} {} failed: {}",
                    retired.kind, retired.name, e
                );
                return self.resync();
            }
        }
        Outcome::Continue
    }

    /// Step 5: label deployments installed by this hub's chart subscriptions.
    async fn adopt_helm_deployments(&mut self) -> HubResult<()> {
        let subscriptions: BTreeSet<&str> = COMPONENTS
            .iter()
            .filter(|def| self.hub.spec.is_enabled(def.name))
            .filter_map(|def| def.chart.map(|c| c.name))
            .collect();

        let mut to_adopt = Vec::new();
        for release in &self.snapshot.helm_releases {
            let owned = release
                .owner_references()
                .iter()
                .any(|o| o.kind == "Subscription" && subscriptions.contains(o.name.as_str()));
            if !owned {
                continue;
            }
            let release_name = release.name_any();
            for deployment in self.snapshot.deployments.iter().filter(|d| {
                d.namespace() == release.namespace()
                    && d
                        .owner_references()
                        .iter()
                        .any(|o| o.kind == "HelmRelease" && o.name == release_name)
            }) {
                if has_identity_of(deployment, &self.hub) {
                    continue;
                }
                let mut desired = DynamicObject::new(&deployment.name_any(), &kinds::deployment())
                    .within(&deployment.namespace().unwrap_or_default());
                stamp_identity_labels(&mut desired, &self.hub);
                to_adopt.push(desired);
            }
        }

        for desired in to_adopt {
            ensure_present_with(
                self.store,
                &self.hub,
                &mut self.status.conditions,
                &desired,
                Some(ADOPTION_PATHS),
            )
            .await?;
        }
        Ok(())
    }

    /// Step 6: pause marker.
    fn pause_gate(&mut self) -> Outcome {
        let progressing_reason = find_condition(&self.status.conditions, ConditionType::Progressing)
            .and_then(|c| c.reason.clone());

        if self.hub.is_paused() {
            if progressing_reason.as_deref() != Some(REASON_PAUSED) {
                info!("MultiClusterHub {} is paused", self.display());
                set_condition(
                    &mut self.status.conditions,
                    ConditionType::Progressing,
                    ConditionStatus::Unknown,
                    REASON_PAUSED,
                    "the hub is paused",
                );
            }
            return Outcome::Halt;
        }

        if progressing_reason.as_deref() == Some(REASON_PAUSED) {
            info!("MultiClusterHub {} resumed", self.display());
            set_condition(
                &mut self.status.conditions,
                ConditionType::Progressing,
                ConditionStatus::True,
                REASON_RESUMED,
                "the hub is no longer paused",
            );
        }
        Outcome::Continue
    }

    /// Step 7: upgrade compatibility guards.
    async fn compatibility_guards(&mut self) -> HubResult<Outcome> {
        let current = self.status.current_version.clone().unwrap_or_default();
        let desired = self.version().to_string();

        let matching: Vec<_> = self
            .ctx
            .config
            .compatibility_guards
            .iter()
            .filter(|g| g.matches(&current, &desired))
            .collect();

        if let Some(guard) = matching
            .iter()
            .find(|g| self.hub.spec.is_enabled(&g.blocking_component))
        {
            warn!(
                "Upgrade of MultiClusterHub {} from {} to {} blocked by {}",
                self.display(),
                current,
                desired,
                guard.blocking_component
            );
            set_condition(
                &mut self.status.conditions,
                ConditionType::Blocked,
                ConditionStatus::True,
                REASON_RESOURCE_BLOCKED,
                &guard.message,
            );
            return Ok(Outcome::Halt);
        }

        let namespace = self.namespace();
        for guard in matching {
            if let Some(retired) = &guard.retired {
                ensure_absent(self.store, &retired.body(&namespace)).await?;
            }
        }
        remove_condition(&mut self.status.conditions, ConditionType::Blocked);
        Ok(Outcome::Continue)
    }

    /// Step 8: the subscription operator must be running.
    async fn check_dependency(&mut self) -> HubResult<Outcome> {
        let name = &self.ctx.config.dependency_deployment;
        let namespace = self.namespace();
        let available = self
            .store
            .get(&kinds::deployment(), Some(&namespace), name)
            .await?
            .and_then(|d| {
                d.data
                    .pointer("/status/availableReplicas")
                    .and_then(Value::as_i64)
            })
            .is_some_and(|replicas| replicas > 0);

        if available {
            Ok(Outcome::Continue)
        } else {
            info!(
                "Waiting for deployment {}/{} to become available",
                namespace, name
            );
            Ok(self.resync())
        }
    }

    /// Step 9: CRDs.
    async fn install_crds(&mut self) -> HubResult<()> {
        let Some(dir) = &self.ctx.config.crds_path else {
            return Err(HubError::config_with_reason(
                REASON_CRD_RENDER_FAILURE,
                format!("{ENV_CRDS_PATH} is not set"),
            ));
        };
        let crds = load_crds(self.ctx.manifests.as_ref(), dir).await?;
        for crd in &crds {
            ensure_present(self.store, &self.hub, &mut self.status.conditions, crd).await?;
        }
        Ok(())
    }

    /// Step 10: the pull secret must exist.
    async fn check_pull_secret(&mut self) -> HubResult<()> {
        let Some(secret) = self.hub.spec.image_pull_secret.as_deref() else {
            return Ok(());
        };
        let namespace = self.namespace();
        if self
            .store
            .get(&kinds::secret(), Some(&namespace), secret)
            .await?
            .is_none()
        {
            return Err(HubError::config_with_reason(
                REASON_PULL_SECRET_MISSING,
                format!("pull secret {namespace}/{secret} not found"),
            ));
        }
        Ok(())
    }

    fn render_context(&self) -> RenderContext<'_> {
        RenderContext {
            hub: &self.hub,
            images: &self.cache.image_overrides,
            ingress_domain: &self.cache.ingress_domain,
            platform_version: &self.cache.platform_version,
        }
    }

    /// Step 11: components in table order.
    async fn converge_components(&mut self) -> HubResult<Outcome> {
        for def in COMPONENTS {
            let outcome = self.converge_component(def).await?;
            if !outcome.is_continue() {
                return Ok(outcome);
            }
        }
        Ok(Outcome::Continue)
    }

    async fn converge_component(&mut self, def: &ComponentDef) -> HubResult<Outcome> {
        let bodies = def.bodies(&self.render_context());

        if self.hub.spec.is_enabled(def.name) {
            for body in &bodies {
                let change =
                    ensure_present(self.store, &self.hub, &mut self.status.conditions, body)
                        .await?;
                if change.is_structural() {
                    return Ok(Outcome::Requeue);
                }
            }
        } else {
            for body in bodies.iter().rev() {
                if ensure_absent(self.store, body).await?.is_structural() {
                    info!("Removed disabled component {} body {}", def.name, body.name_any());
                    return Ok(Outcome::Requeue);
                }
            }
        }
        Ok(Outcome::Continue)
    }

    /// Step 12: the engine, adopting a pre-existing one.
    async fn converge_engine(&mut self) -> HubResult<Outcome> {
        let mut desired = multicluster_engine(&self.render_context());
        stamp_identity_labels(&mut desired, &self.hub);

        let live = self
            .snapshot
            .engines
            .iter()
            .find(|e| e.name_any() == MULTICLUSTER_ENGINE_NAME);
        if let Some(live) = live {
            if !has_identity_of(live, &self.hub) {
                info!("Adopting existing MultiClusterEngine {}", MULTICLUSTER_ENGINE_NAME);
                desired = mark_adopted(desired);
            }
        }

        let change =
            ensure_present(self.store, &self.hub, &mut self.status.conditions, &desired).await?;
        if change.is_structural() {
            return Ok(Outcome::Requeue);
        }
        Ok(Outcome::Continue)
    }

    /// Step 13: ingress domain.
    async fn discover_ingress_domain(&mut self) -> HubResult<()> {
        if self.ctx.config.unit_test || !self.cache.ingress_domain.is_empty() {
            return Ok(());
        }
        let domain = self
            .store
            .get(&kinds::ingress_config(), None, CLUSTER_SINGLETON_NAME)
            .await?
            .and_then(|ingress| {
                ingress
                    .data
                    .pointer("/spec/domain")
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
            })
            .unwrap_or_default();
        if !domain.is_empty() {
            info!("Discovered ingress domain {}", domain);
            self.cache.ingress_domain = domain;
        }
        Ok(())
    }

    /// Step 14: base templates.
    async fn install_templates(&mut self) -> HubResult<()> {
        let Some(root) = &self.ctx.config.templates_path else {
            return Err(HubError::config_with_reason(
                REASON_RESOURCE_RENDER_FAILURE,
                format!("{ENV_TEMPLATES_PATH} is not set"),
            ));
        };
        let dir = root.join(TEMPLATES_KIND).join(TEMPLATES_BASE_DIR);
        let templates = load_templates(self.ctx.manifests.as_ref(), &dir).await?;

        for template in &templates {
            if let Err(e) =
                ensure_present(self.store, &self.hub, &mut self.status.conditions, template).await
            {
                if e.is_transient() {
                    return Err(e);
                }
                return Err(HubError::config_with_reason(
                    REASON_DEPLOY_FAILURE,
                    format!("failed to deploy template {}: {e}", template.name_any()),
                ));
            }
        }
        Ok(())
    }

    /// Step 15: import or export the hub as a managed cluster.
    async fn converge_self_registration(&mut self) -> HubResult<()> {
        if self.ctx.config.unit_test {
            return Ok(());
        }
        let cluster = local_cluster();
        if self.hub.spec.disable_hub_self_management {
            ensure_absent(self.store, &cluster).await?;
        } else {
            ensure_present(self.store, &self.hub, &mut self.status.conditions, &cluster).await?;
        }
        Ok(())
    }

    /// Step 16: console plugin and sweep of stale component children.
    async fn finish_when_healthy(&mut self) -> HubResult<()> {
        if !all_healthy(&enabled_component_health(&self.hub, &self.snapshot)) {
            debug!(
                "Components of MultiClusterHub {} not yet healthy, deferring plugin registration and sweep",
                self.display()
            );
            return Ok(());
        }

        if self.hub.spec.is_enabled(COMPONENT_CONSOLE)
            && version_at_least(&self.cache.platform_version, CONSOLE_PLUGIN_MIN_PLATFORM_VERSION)
        {
            self.register_console_plugin().await?;
        }

        self.sweep_stale_children().await
    }

    async fn register_console_plugin(&mut self) -> HubResult<()> {
        let plugin = console_plugin(&self.render_context());
        ensure_present(self.store, &self.hub, &mut self.status.conditions, &plugin).await?;

        let Some(console) = self
            .store
            .get(&kinds::console(), None, CLUSTER_SINGLETON_NAME)
            .await?
        else {
            debug!("No platform Console resource, skipping plugin enablement");
            return Ok(());
        };
        if let Some(desired) = console_with_plugin(&plugin_list(&console), CONSOLE_PLUGIN_NAME) {
            ensure_present(self.store, &self.hub, &mut self.status.conditions, &desired).await?;
        }
        Ok(())
    }

    async fn sweep_stale_children(&mut self) -> HubResult<()> {
        let ctx = self.render_context();
        let produced: BTreeSet<(String, Option<String>, String)> = COMPONENTS
            .iter()
            .filter(|def| self.hub.spec.is_enabled(def.name))
            .flat_map(|def| def.bodies(&ctx))
            .filter_map(|body| {
                let kind = body.types.as_ref()?.kind.clone();
                Some((kind, body.namespace(), body.name_any()))
            })
            .collect();

        let selector = format!(
            "{},{HUB_COMPONENT}",
            installer_selector(&self.hub.name_any(), &self.namespace())
        );
        for ar in [
            kinds::app_subscription(),
            kinds::deployment(),
            kinds::service(),
            kinds::channel(),
        ] {
            for obj in self.store.list(&ar, None, Some(&selector)).await? {
                let key = (ar.kind.clone(), obj.namespace(), obj.name_any());
                if produced.contains(&key) {
                    continue;
                }
                let mut stale = DynamicObject::new(&obj.name_any(), &ar);
                stale.metadata.namespace = obj.namespace();
                ensure_absent(self.store, &stale).await?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    fn phase(&self, healthy: bool) -> &'static str {
        let blocked = find_condition(&self.status.conditions, ConditionType::Blocked)
            .is_some_and(|c| c.status == ConditionStatus::True);
        let current = self.status.current_version.as_deref().unwrap_or_default();

        if self.hub.metadata.deletion_timestamp.is_some() {
            PHASE_UNINSTALLING
        } else if self.hub.is_paused() {
            PHASE_PAUSED
        } else if blocked {
            PHASE_UPDATING_BLOCKED
        } else if healthy {
            PHASE_RUNNING
        } else if current.is_empty() {
            PHASE_INSTALLING
        } else if current != self.version() {
            PHASE_UPDATING
        } else {
            PHASE_PENDING
        }
    }

    async fn sync_status(&mut self) -> HubResult<Outcome> {
        let health = enabled_component_health(&self.hub, &self.snapshot);
        for (component, h) in &health {
            record_component_health(component, h.status == ConditionStatus::True);
        }
        let healthy = all_healthy(&health);

        self.status.desired_version = Some(self.version().to_string());
        self.status.components = health;

        if healthy {
            set_condition(
                &mut self.status.conditions,
                ConditionType::Complete,
                ConditionStatus::True,
                REASON_ALL_COMPONENTS_HEALTHY,
                "all hub components ready",
            );
        } else {
            set_condition(
                &mut self.status.conditions,
                ConditionType::Complete,
                ConditionStatus::False,
                REASON_COMPONENTS_UNAVAILABLE,
                "not all hub components ready",
            );
        }

        self.status.phase = Some(self.phase(healthy).to_string());
        if healthy && self.status.phase.as_deref() == Some(PHASE_RUNNING) {
            self.status.current_version = self.status.desired_version.clone();
        }

        if self.updater.apply(self.store, &self.status).await? {
            debug!(
                "Updated status of MultiClusterHub {}: phase={:?}",
                self.display(),
                self.status.phase
            );
        }

        if healthy {
            Ok(Outcome::Continue)
        } else {
            Ok(self.resync())
        }
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod hub_tests;

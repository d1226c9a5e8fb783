// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `MultiClusterHub` controller wiring.
//!
//! Builds the kube-runtime [`Controller`] from the hub watch (filtered by
//! generation and mirrored into a reflector store) plus the secondary watches
//! of [`standard_watches`], and runs [`reconcile_hub`] for every request.

use crate::constants::{ERROR_REQUEUE_DURATION_SECS, KIND_MULTICLUSTERHUB};
use crate::context::Context;
use crate::crd::MultiClusterHub;
use crate::metrics::{
    record_error, record_reconciliation_error, record_reconciliation_requeue,
    record_reconciliation_success,
};
use crate::reconcilers::hub::{reconcile_hub, Outcome};
use crate::watches::{
    admit_event, correlate, standard_watches, WatchFilter, WatchSpec, HUB_PREDICATES,
};
use anyhow::Result;
use futures::{Stream, StreamExt};
use kube::api::{Api, DynamicObject};
use kube::runtime::controller::Action;
use kube::runtime::watcher::{self, watcher, Config as WatcherConfig};
use kube::runtime::{reflector, Controller, WatchStreamExt};
use kube::{Client, ResourceExt};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Reconciliation error wrapper
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

/// Error policy for the hub controller.
///
/// Returns an action to requeue the resource after a delay when reconciliation fails.
#[allow(clippy::needless_pass_by_value)] // Signature required by kube::runtime::Controller
fn error_policy<T, C>(resource: Arc<T>, err: &ReconcileError, _ctx: Arc<C>) -> Action
where
    T: Debug,
{
    error!(
        error = %err,
        resource = ?resource,
        "Reconciliation error - will retry in {}s",
        ERROR_REQUEUE_DURATION_SECS
    );
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

fn secondary_stream(
    client: Client,
    spec: &WatchSpec,
) -> impl Stream<Item = Result<DynamicObject, watcher::Error>> + Send + 'static {
    let api = Api::<DynamicObject>::all_with(client, &spec.resource);
    let mut filter = WatchFilter::new(spec.predicates);
    watcher(api, WatcherConfig::default())
        .default_backoff()
        .filter_map(move |event| futures::future::ready(admit_event(event, &mut filter)))
}

/// Run the `MultiClusterHub` controller until its watches end.
///
/// # Arguments
///
/// * `client` - Kubernetes client used for the watches
/// * `context` - Shared context passed to every reconciliation
///
/// # Errors
///
/// Returns an error if the controller fails to start.
pub async fn run_hub_controller(client: Client, context: Arc<Context>) -> Result<()> {
    info!("Starting {} controller", KIND_MULTICLUSTERHUB);

    let hubs: Api<MultiClusterHub> = match &context.config.watch_namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    let (reader, writer) = reflector::store();
    let mut hub_filter = WatchFilter::new(HUB_PREDICATES);
    let hub_stream = watcher(hubs, WatcherConfig::default())
        .default_backoff()
        .reflect(writer)
        .filter_map(move |event| futures::future::ready(admit_event(event, &mut hub_filter)));

    let mut controller = Controller::for_stream(hub_stream, reader.clone());
    for spec in standard_watches() {
        debug!(
            kind = %spec.resource.kind,
            correlation = ?spec.correlation,
            predicates = ?spec.predicates,
            "Registering secondary watch"
        );
        let hub_store = reader.clone();
        let correlation = spec.correlation;
        controller = controller.watches_stream_with(
            secondary_stream(client.clone(), &spec),
            move |obj| correlate(correlation, &obj, &hub_store.state()),
            spec.resource.clone(),
        );
    }

    controller
        .run(reconcile_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper recording metrics and translating the pass outcome.
async fn reconcile_wrapper(
    hub: Arc<MultiClusterHub>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let namespace = hub.namespace().unwrap_or_default();
    let name = hub.name_any();

    debug!(
        namespace = %namespace,
        name = %name,
        "Reconcile wrapper called for MultiClusterHub"
    );

    match reconcile_hub(&ctx, &namespace, &name).await {
        Ok(outcome) => {
            record_reconciliation_success(KIND_MULTICLUSTERHUB, start.elapsed());
            match outcome {
                Outcome::Requeue => {
                    record_reconciliation_requeue(KIND_MULTICLUSTERHUB, "structural_change");
                }
                Outcome::RequeueAfter(_) => {
                    record_reconciliation_requeue(KIND_MULTICLUSTERHUB, "resync");
                }
                Outcome::Continue | Outcome::Halt => {}
            }
            Ok(outcome.action())
        }
        Err(e) => {
            error!("Failed to reconcile MultiClusterHub {}/{}: {}", namespace, name, e);
            record_reconciliation_error(KIND_MULTICLUSTERHUB, start.elapsed());
            record_error(
                KIND_MULTICLUSTERHUB,
                if e.is_transient() { "transient" } else { "permanent" },
            );
            Err(ReconcileError::from(anyhow::Error::from(e)))
        }
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch correlation for the `MultiClusterHub` controller.
//!
//! Secondary objects (deployments, subscriptions, config maps, API services,
//! the cluster version) do not name the hub they belong to in a uniform way.
//! Each watched kind is paired with a [`Correlation`] strategy that maps an
//! event to the hub(s) to reconcile, and a list of [`Predicate`]s evaluated
//! before correlation.
//!
//! The singleton strategy reads the hub reflector store synchronously, the
//! same way the mapper of any kube-runtime secondary watch does.
//!
//! # Example
//!
//! ```rust,no_run
//! use hub_operator::crd::MultiClusterHub;
//! use hub_operator::watches::{correlate, Correlation};
//! use kube::api::DynamicObject;
//! use kube::runtime::reflector::Store;
//!
//! # fn example(store: Store<MultiClusterHub>, obj: DynamicObject) {
//! let hubs = correlate(Correlation::Owner, &obj, &store.state());
//! # }
//! ```

use crate::constants::KIND_MULTICLUSTERHUB;
use crate::crd::MultiClusterHub;
use crate::kinds;
use crate::labels::{INSTALLER_NAME, INSTALLER_NAMESPACE};
use kube::api::{ApiResource, DynamicObject};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::{self, Event};
use kube::{Resource, ResourceExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// How an event on a watched kind is mapped to hub reconcile requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Correlation {
    /// Controller owner reference of kind `MultiClusterHub`
    Owner,
    /// Both installer identity labels
    InstallerLabels,
    /// Whatever hub exists; the operator manages one per cluster
    Singleton,
}

/// Filter evaluated before correlation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// Drop updates that did not change `metadata.generation`
    GenerationChanged,
    /// Only deletions pass
    DeleteOnly,
    /// Only objects carrying both installer identity labels pass
    HasInstallerLabels,
}

/// A watch event as seen by the predicates.
#[derive(Debug)]
pub enum Observed<'a, K> {
    Applied(&'a K),
    Deleted(&'a K),
}

impl<K> Clone for Observed<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Observed<'_, K> {}

impl<'a, K> Observed<'a, K> {
    /// The object carried by the event.
    #[must_use]
    pub fn object(&self) -> &'a K {
        match *self {
            Self::Applied(obj) | Self::Deleted(obj) => obj,
        }
    }

    fn is_delete(&self) -> bool {
        matches!(self, Self::Deleted(_))
    }
}

/// Last generation seen per object.
#[derive(Debug, Default)]
pub struct GenerationTracker {
    seen: HashMap<String, Option<i64>>,
}

impl GenerationTracker {
    fn key<K: Resource>(obj: &K) -> String {
        let meta = obj.meta();
        meta.uid.clone().unwrap_or_else(|| {
            format!(
                "{}/{}",
                meta.namespace.as_deref().unwrap_or_default(),
                meta.name.as_deref().unwrap_or_default()
            )
        })
    }

    /// Record an event; returns whether it passes the generation filter.
    ///
    /// First sightings and deletions always pass.
    pub fn observe<K: Resource>(&mut self, event: Observed<'_, K>) -> bool {
        let obj = event.object();
        let key = Self::key(obj);
        if event.is_delete() {
            self.seen.remove(&key);
            return true;
        }
        let generation = obj.meta().generation;
        match self.seen.insert(key, generation) {
            None => true,
            Some(previous) => previous != generation,
        }
    }
}

/// Predicates of one watch plus the state they need.
#[derive(Debug, Default)]
pub struct WatchFilter {
    predicates: Vec<Predicate>,
    generations: GenerationTracker,
}

impl WatchFilter {
    #[must_use]
    pub fn new(predicates: &[Predicate]) -> Self {
        Self {
            predicates: predicates.to_vec(),
            generations: GenerationTracker::default(),
        }
    }

    /// Whether every predicate admits the event.
    pub fn admits<K: Resource>(&mut self, event: Observed<'_, K>) -> bool {
        let mut admitted = true;
        for predicate in &self.predicates {
            admitted &= match predicate {
                Predicate::GenerationChanged => self.generations.observe(event),
                Predicate::DeleteOnly => event.is_delete(),
                Predicate::HasInstallerLabels => has_installer_labels(event.object()),
            };
        }
        admitted
    }
}

/// Turn a raw watcher event into the object to correlate, if the filter admits it.
///
/// Initial-listing markers carry no object and are dropped; watcher errors are
/// passed through for the controller to back off on.
pub fn admit_event<K: Resource>(
    event: Result<Event<K>, watcher::Error>,
    filter: &mut WatchFilter,
) -> Option<Result<K, watcher::Error>> {
    match event {
        Ok(Event::Apply(obj) | Event::InitApply(obj)) => {
            filter.admits(Observed::Applied(&obj)).then_some(Ok(obj))
        }
        Ok(Event::Delete(obj)) => filter.admits(Observed::Deleted(&obj)).then_some(Ok(obj)),
        Ok(Event::Init | Event::InitDone) => None,
        Err(e) => Some(Err(e)),
    }
}

fn installer_identity<K: Resource>(obj: &K) -> Option<(&str, &str)> {
    let labels = obj.meta().labels.as_ref()?;
    let name = labels
        .get(INSTALLER_NAME)
        .map(String::as_str)
        .filter(|v| !v.is_empty())?;
    let namespace = labels
        .get(INSTALLER_NAMESPACE)
        .map(String::as_str)
        .filter(|v| !v.is_empty())?;
    Some((name, namespace))
}

/// Whether the object carries both installer identity labels.
#[must_use]
pub fn has_installer_labels<K: Resource>(obj: &K) -> bool {
    installer_identity(obj).is_some()
}

/// Map an event object to the hubs to reconcile.
///
/// # Arguments
///
/// * `correlation` - Strategy attached to the watched kind
/// * `obj` - The object the event was raised for
/// * `hubs` - Current contents of the hub reflector store
#[must_use]
pub fn correlate(
    correlation: Correlation,
    obj: &DynamicObject,
    hubs: &[Arc<MultiClusterHub>],
) -> Vec<ObjectRef<MultiClusterHub>> {
    match correlation {
        Correlation::Owner => {
            let Some(namespace) = obj.namespace() else {
                return vec![];
            };
            obj.owner_references()
                .iter()
                .filter(|o| o.controller == Some(true) && o.kind == KIND_MULTICLUSTERHUB)
                .map(|o| ObjectRef::new(&o.name).within(&namespace))
                .collect()
        }
        Correlation::InstallerLabels => installer_identity(obj)
            .map(|(name, namespace)| vec![ObjectRef::new(name).within(namespace)])
            .unwrap_or_default(),
        Correlation::Singleton => {
            let mut refs: Vec<ObjectRef<MultiClusterHub>> =
                hubs.iter().map(|hub| ObjectRef::from_obj(hub.as_ref())).collect();
            refs.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
            match refs.len() {
                0 => {
                    debug!("No MultiClusterHub to notify about {}", obj.name_any());
                    vec![]
                }
                1 => refs,
                n => {
                    warn!(
                        "Found {} MultiClusterHub resources, notifying only {}",
                        n, refs[0]
                    );
                    refs.truncate(1);
                    refs
                }
            }
        }
    }
}

/// One secondary watch of the hub controller.
#[derive(Clone, Debug)]
pub struct WatchSpec {
    pub resource: ApiResource,
    pub correlation: Correlation,
    pub predicates: &'static [Predicate],
}

/// Predicates of the primary `MultiClusterHub` watch.
pub const HUB_PREDICATES: &[Predicate] = &[Predicate::GenerationChanged];

/// Secondary watches of the hub controller.
#[must_use]
pub fn standard_watches() -> Vec<WatchSpec> {
    vec![
        WatchSpec {
            resource: kinds::deployment(),
            correlation: Correlation::Owner,
            predicates: &[],
        },
        WatchSpec {
            resource: kinds::app_subscription(),
            correlation: Correlation::Owner,
            predicates: &[],
        },
        WatchSpec {
            resource: kinds::config_map(),
            correlation: Correlation::Owner,
            predicates: &[],
        },
        WatchSpec {
            resource: kinds::api_service(),
            correlation: Correlation::InstallerLabels,
            predicates: &[Predicate::DeleteOnly],
        },
        WatchSpec {
            resource: kinds::deployment(),
            correlation: Correlation::InstallerLabels,
            predicates: &[Predicate::HasInstallerLabels],
        },
        WatchSpec {
            resource: kinds::cluster_version(),
            correlation: Correlation::Singleton,
            predicates: &[],
        },
    ]
}

#[cfg(test)]
#[path = "watches_tests.rs"]
mod watches_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Field-projection comparison between a live object and its desired body.
//!
//! Only the allow-listed paths of a kind are compared. For every allow-listed
//! path present in the desired body whose value is not already reflected in the
//! live object, the desired value is copied into a copy of the live object and
//! the path is added to a JSON merge patch. Everything else in the live object
//! is left alone.
//!
//! A path is a list of object keys, so label keys containing dots
//! (`installer.name`) are addressable.
//!
//! Comparison is by containment: a desired value matches when every field it
//! sets is present with the same value in live. Fields the API server defaults
//! on its own (container `terminationMessagePath`, service `clusterIP`, ...)
//! therefore never count as drift.

use crate::labels::{ANNOTATION_ADOPTED, INSTALLER_NAME, INSTALLER_NAMESPACE, LOCAL_CLUSTER};
use serde_json::{Map, Value};

/// A path into a JSON object, one key per segment.
pub type FieldPath = &'static [&'static str];

/// Result of comparing a live object against a desired body.
#[derive(Clone, Debug, PartialEq)]
pub struct Validation {
    /// Live object with every differing allow-listed path taken from desired
    pub merged: Value,
    /// Whether any allow-listed path differed
    pub changed: bool,
    /// Merge patch that turns live into `merged`; an empty object when unchanged
    pub patch: Value,
}

const APPSUB_PATHS: &[FieldPath] = &[
    &["spec", "channel"],
    &["spec", "name"],
    &["spec", "packageFilter"],
    &["spec", "packageOverrides"],
    &["spec", "placement"],
];

const OLM_SUBSCRIPTION_PATHS: &[FieldPath] = &[
    &["spec", "channel"],
    &["spec", "name"],
    &["spec", "source"],
    &["spec", "sourceNamespace"],
    &["spec", "installPlanApproval"],
    &["spec", "startingCSV"],
    &["spec", "config"],
];

const DEPLOYMENT_PATHS: &[FieldPath] = &[
    &["spec", "replicas"],
    &["spec", "template", "metadata", "labels"],
    &["spec", "template", "spec", "containers"],
    &["spec", "template", "spec", "imagePullSecrets"],
    &["spec", "template", "spec", "nodeSelector"],
    &["spec", "template", "spec", "tolerations"],
    &["spec", "template", "spec", "serviceAccountName"],
];

const SERVICE_PATHS: &[FieldPath] = &[&["spec", "ports"], &["spec", "selector"]];

const CHANNEL_PATHS: &[FieldPath] = &[&["spec", "type"], &["spec", "pathname"]];

const CONFIG_MAP_PATHS: &[FieldPath] = &[&["data"]];

const CRD_PATHS: &[FieldPath] = &[&["spec"]];

const ENGINE_PATHS: &[FieldPath] = &[
    &["spec", "availabilityConfig"],
    &["spec", "imagePullSecret"],
    &["spec", "targetNamespace"],
    &["spec", "nodeSelector"],
    &["spec", "overrides"],
    &["metadata", "labels", INSTALLER_NAME],
    &["metadata", "labels", INSTALLER_NAMESPACE],
    &["metadata", "annotations", ANNOTATION_ADOPTED],
];

const MANAGED_CLUSTER_PATHS: &[FieldPath] = &[
    &["spec", "hubAcceptsClient"],
    &["metadata", "labels", LOCAL_CLUSTER],
];

const CONSOLE_PATHS: &[FieldPath] = &[&["spec", "plugins"]];

const TEMPLATE_PATHS: &[FieldPath] = &[
    &["spec"],
    &["data"],
    &["rules"],
    &["subjects"],
    &["roleRef"],
    &["webhooks"],
];

/// Paths used when adopting an existing object: only the identity labels.
pub const ADOPTION_PATHS: &[FieldPath] = &[
    &["metadata", "labels", INSTALLER_NAME],
    &["metadata", "labels", INSTALLER_NAMESPACE],
];

fn group_of(api_version: &str) -> &str {
    api_version.split_once('/').map_or("", |(group, _)| group)
}

/// Allow-listed paths for a kind.
#[must_use]
pub fn allow_list(api_version: &str, kind: &str) -> &'static [FieldPath] {
    match (group_of(api_version), kind) {
        ("apps.open-cluster-management.io", "Subscription") => APPSUB_PATHS,
        ("operators.coreos.com", "Subscription") => OLM_SUBSCRIPTION_PATHS,
        ("apps", "Deployment") => DEPLOYMENT_PATHS,
        ("", "Service") => SERVICE_PATHS,
        (_, "Channel") => CHANNEL_PATHS,
        ("", "ConfigMap") => CONFIG_MAP_PATHS,
        ("apiextensions.k8s.io", "CustomResourceDefinition") => CRD_PATHS,
        (_, "MultiClusterEngine") => ENGINE_PATHS,
        (_, "ManagedCluster") => MANAGED_CLUSTER_PATHS,
        ("operator.openshift.io", "Console") => CONSOLE_PATHS,
        ("", "Namespace") => &[],
        _ => TEMPLATE_PATHS,
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

fn insert(target: &mut Value, path: &[&str], new: Value) {
    let mut cursor = target;
    for key in path {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        cursor = &mut cursor[*key];
    }
    *cursor = new;
}

/// Whether every field set in `desired` is present with the same value in `live`.
#[must_use]
pub fn contains(live: Option<&Value>, desired: &Value) -> bool {
    match (live, desired) {
        (_, Value::Null) => live.is_none_or(Value::is_null),
        (Some(Value::Object(l)), Value::Object(d)) => {
            d.iter().all(|(k, dv)| contains(l.get(k), dv))
        }
        (Some(Value::Array(l)), Value::Array(d)) => {
            l.len() == d.len() && l.iter().zip(d).all(|(lv, dv)| contains(Some(lv), dv))
        }
        (Some(l), d) => l == d,
        (None, _) => false,
    }
}

/// Merge patch fragment that turns `live` into exactly `desired`.
fn replacement(live: Option<&Value>, desired: &Value) -> Value {
    match (live, desired) {
        (Some(Value::Object(l)), Value::Object(d)) => {
            let mut out = Map::new();
            for (k, dv) in d {
                out.insert(k.clone(), replacement(l.get(k), dv));
            }
            for k in l.keys().filter(|k| !d.contains_key(*k)) {
                out.insert(k.clone(), Value::Null);
            }
            Value::Object(out)
        }
        _ => desired.clone(),
    }
}

/// Compare `live` against `desired` using the allow-list of the desired kind.
#[must_use]
pub fn validate(live: &Value, desired: &Value) -> Validation {
    let api_version = desired
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let kind = desired
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or_default();
    validate_paths(live, desired, allow_list(api_version, kind))
}

/// Compare `live` against `desired` on an explicit list of paths.
#[must_use]
pub fn validate_paths(live: &Value, desired: &Value, paths: &[FieldPath]) -> Validation {
    let mut merged = live.clone();
    let mut patch = Value::Object(Map::new());
    let mut changed = false;

    for path in paths {
        let Some(want) = lookup(desired, path).filter(|v| !v.is_null()) else {
            continue;
        };
        let have = lookup(live, path);
        if contains(have, want) {
            continue;
        }
        insert(&mut patch, path, replacement(have, want));
        insert(&mut merged, path, want.clone());
        changed = true;
    }

    Validation {
        merged,
        changed,
        patch,
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod validate_tests;

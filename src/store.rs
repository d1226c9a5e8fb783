// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store capability used by every reconciliation step.
//!
//! The convergence primitives never talk to `kube::Api` directly. They go through
//! [`ObjectStore`], which addresses any kind by [`ApiResource`] and works on
//! [`DynamicObject`]s. [`KubeObjectStore`] is the production implementation;
//! unit tests use an in-memory store.
//!
//! A `namespace` of `None` addresses cluster-scoped kinds (or lists across all
//! namespaces).

use crate::errors::StoreError;
use async_trait::async_trait;
use kube::api::{
    ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams,
};
use kube::{Api, Client};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Read and write access to cluster objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object; `Ok(None)` when it does not exist.
    async fn get(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError>;

    /// List objects, optionally restricted to a namespace and an equality label selector.
    async fn list(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    /// Create an object; the namespace is taken from its metadata.
    async fn create(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Apply a JSON merge patch to an object.
    async fn patch(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject, StoreError>;

    /// Delete an object. Absent objects yield [`StoreError::NotFound`].
    async fn delete(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError>;

    /// Apply a JSON merge patch to the status subresource.
    async fn patch_status(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<(), StoreError>;
}

/// Human readable `namespace/name` (or `name` for cluster-scoped objects).
#[must_use]
pub fn display_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}/{name}"),
        _ => name.to_string(),
    }
}

/// Whether `labels` satisfy an equality-based selector such as `a=b,c`.
///
/// Bare keys require presence; `k=v` and `k==v` require equality; `k!=v`
/// requires the value to differ or be absent.
#[must_use]
pub fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((key, value)) = term.split_once("!=") {
                labels.get(key.trim()).map(String::as_str) != Some(value.trim())
            } else if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('='))
            {
                labels.get(key.trim()).map(String::as_str) == Some(value.trim())
            } else {
                labels.contains_key(term)
            }
        })
}

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, ar: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) if !ns.is_empty() => Api::namespaced_with(self.client.clone(), ns, ar),
            _ => Api::all_with(self.client.clone(), ar),
        }
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        self.api(ar, namespace)
            .get_opt(name)
            .await
            .map_err(|e| StoreError::from_kube(e, &ar.kind, &display_name(namespace, name)))
    }

    async fn list(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let list = self
            .api(ar, namespace)
            .list(&params)
            .await
            .map_err(|e| StoreError::from_kube(e, &ar.kind, namespace.unwrap_or("*")))?;
        Ok(list.items)
    }

    async fn create(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let namespace = obj.metadata.namespace.as_deref();
        let name = obj.metadata.name.clone().unwrap_or_default();
        debug!("Creating {} {}", ar.kind, display_name(namespace, &name));
        self.api(ar, namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| StoreError::from_kube(e, &ar.kind, &display_name(namespace, &name)))
    }

    async fn patch(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject, StoreError> {
        debug!("Patching {} {}", ar.kind, display_name(namespace, name));
        self.api(ar, namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| StoreError::from_kube(e, &ar.kind, &display_name(namespace, name)))
    }

    async fn delete(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        debug!("Deleting {} {}", ar.kind, display_name(namespace, name));
        self.api(ar, namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, &ar.kind, &display_name(namespace, name)))
    }

    async fn patch_status(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<(), StoreError> {
        self.api(ar, namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, &ar.kind, &display_name(namespace, name)))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Test support: an in-memory [`ObjectStore`] and hub fixtures.
//!
//! [`MemoryStore`] keeps objects keyed by `apiVersion/kind/namespace/name`,
//! records every mutating call and can be told to fail specific calls.

use crate::constants::HUB_FINALIZER;
use crate::crd::{MultiClusterHub, MultiClusterHubSpec};
use crate::errors::StoreError;
use crate::kinds;
use crate::store::{display_name, matches_selector, ObjectStore};
use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject};
use kube::core::ObjectMeta;
use kube::ResourceExt;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

pub const TEST_HUB_NAME: &str = "multiclusterhub";
pub const TEST_HUB_NAMESPACE: &str = "open-cluster-management";

/// Store call kinds, used for the mutation log and failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Create,
    Patch,
    Delete,
    PatchStatus,
}

/// One recorded mutating call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    pub verb: Verb,
    pub kind: String,
    pub name: String,
}

type Key = (String, String, String, String);

#[derive(Default)]
struct Inner {
    objects: BTreeMap<Key, Value>,
    mutations: Vec<Mutation>,
    failures: HashMap<(Verb, String, String), StoreError>,
    next_uid: u64,
}

/// In-memory object store for unit tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn key(ar: &ApiResource, namespace: Option<&str>, name: &str) -> Key {
    (
        ar.api_version.clone(),
        ar.kind.clone(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

/// RFC 7386 JSON merge patch.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    if let Value::Object(patch_map) = patch {
        if !target.is_object() {
            *target = Value::Object(Map::new());
        }
        let target_map = target.as_object_mut().unwrap();
        for (k, v) in patch_map {
            if v.is_null() {
                target_map.remove(k);
            } else {
                merge_patch(target_map.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
    } else {
        *target = patch.clone();
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording a mutation.
    pub fn insert(&self, obj: DynamicObject) {
        let ar = kinds::of(&obj).unwrap();
        let mut inner = self.inner.lock().unwrap();
        inner.next_uid += 1;
        let uid = format!("uid-{}", inner.next_uid);
        let mut value = serde_json::to_value(&obj).unwrap();
        if value["metadata"]["uid"].is_null() {
            value["metadata"]["uid"] = json!(uid);
        }
        let k = key(
            &ar,
            obj.metadata.namespace.as_deref(),
            &obj.name_any(),
        );
        inner.objects.insert(k, value);
    }

    /// Seed a hub resource.
    pub fn insert_hub(&self, hub: &MultiClusterHub) {
        self.insert(hub_object(hub));
    }

    /// Fetch a stored object directly.
    pub fn object(&self, ar: &ApiResource, namespace: Option<&str>, name: &str) -> Option<Value> {
        let inner = self.inner.lock().unwrap();
        inner.objects.get(&key(ar, namespace, name)).cloned()
    }

    /// Whether an object exists.
    pub fn contains(&self, ar: &ApiResource, namespace: Option<&str>, name: &str) -> bool {
        self.object(ar, namespace, name).is_some()
    }

    /// Fetch the stored hub.
    pub fn hub(&self, namespace: &str, name: &str) -> Option<MultiClusterHub> {
        self.object(&kinds::multicluster_hub(), Some(namespace), name)
            .map(|v| serde_json::from_value(v).unwrap())
    }

    /// All stored objects of a kind.
    pub fn objects_of(&self, ar: &ApiResource) -> Vec<Value> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .iter()
            .filter(|((api_version, kind, _, _), _)| {
                *api_version == ar.api_version && *kind == ar.kind
            })
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Recorded mutating calls, oldest first.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.inner.lock().unwrap().mutations.clone()
    }

    /// Number of recorded mutating calls.
    pub fn mutation_count(&self) -> usize {
        self.inner.lock().unwrap().mutations.len()
    }

    /// Forget recorded mutations.
    pub fn clear_mutations(&self) {
        self.inner.lock().unwrap().mutations.clear();
    }

    /// Make every `verb` call on `kind`/`name` fail with `err` until cleared.
    pub fn fail_on(&self, verb: Verb, kind: &str, name: &str, err: StoreError) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert((verb, kind.to_string(), name.to_string()), err);
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().failures.clear();
    }

    fn check(inner: &Inner, verb: Verb, kind: &str, name: &str) -> Result<(), StoreError> {
        match inner
            .failures
            .get(&(verb, kind.to_string(), name.to_string()))
        {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn record(inner: &mut Inner, verb: Verb, kind: &str, name: &str) {
        inner.mutations.push(Mutation {
            verb,
            kind: kind.to_string(),
            name: name.to_string(),
        });
    }
}

fn not_found(ar: &ApiResource, namespace: Option<&str>, name: &str) -> StoreError {
    StoreError::NotFound {
        kind: ar.kind.clone(),
        name: display_name(namespace, name),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check(&inner, Verb::Get, &ar.kind, name)?;
        Ok(inner
            .objects
            .get(&key(ar, namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap()))
    }

    async fn list(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check(&inner, Verb::List, &ar.kind, "*")?;
        Ok(inner
            .objects
            .iter()
            .filter(|((api_version, kind, ns, _), _)| {
                *api_version == ar.api_version
                    && *kind == ar.kind
                    && namespace.is_none_or(|n| n == ns)
            })
            .map(|(_, v)| serde_json::from_value::<DynamicObject>(v.clone()).unwrap())
            .filter(|obj| label_selector.is_none_or(|s| matches_selector(obj.labels(), s)))
            .collect())
    }

    async fn create(
        &self,
        ar: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = obj.name_any();
        let namespace = obj.metadata.namespace.clone();
        let mut inner = self.inner.lock().unwrap();
        Self::check(&inner, Verb::Create, &ar.kind, &name)?;
        let k = key(ar, namespace.as_deref(), &name);
        if inner.objects.contains_key(&k) {
            return Err(StoreError::Conflict {
                kind: ar.kind.clone(),
                name: display_name(namespace.as_deref(), &name),
                message: "already exists".to_string(),
            });
        }
        inner.next_uid += 1;
        let mut value = serde_json::to_value(obj).unwrap();
        value["metadata"]["uid"] = json!(format!("uid-{}", inner.next_uid));
        value["apiVersion"] = json!(ar.api_version);
        value["kind"] = json!(ar.kind);
        inner.objects.insert(k, value.clone());
        Self::record(&mut inner, Verb::Create, &ar.kind, &name);
        Ok(serde_json::from_value(value).unwrap())
    }

    async fn patch(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check(&inner, Verb::Patch, &ar.kind, name)?;
        let k = key(ar, namespace, name);
        let Some(current) = inner.objects.get_mut(&k) else {
            return Err(not_found(ar, namespace, name));
        };
        merge_patch(current, patch);
        let updated = current.clone();
        Self::record(&mut inner, Verb::Patch, &ar.kind, name);
        Ok(serde_json::from_value(updated).unwrap())
    }

    async fn delete(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check(&inner, Verb::Delete, &ar.kind, name)?;
        if inner.objects.remove(&key(ar, namespace, name)).is_none() {
            return Err(not_found(ar, namespace, name));
        }
        Self::record(&mut inner, Verb::Delete, &ar.kind, name);
        Ok(())
    }

    async fn patch_status(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check(&inner, Verb::PatchStatus, &ar.kind, name)?;
        let k = key(ar, namespace, name);
        let Some(current) = inner.objects.get_mut(&k) else {
            return Err(not_found(ar, namespace, name));
        };
        if let Some(status) = patch.get("status") {
            merge_patch(
                current
                    .as_object_mut()
                    .unwrap()
                    .entry("status")
                    .or_insert(Value::Null),
                status,
            );
        }
        Self::record(&mut inner, Verb::PatchStatus, &ar.kind, name);
        Ok(())
    }
}

/// A hub with the given spec in the test namespace, finalizer already present.
pub fn hub_with_spec(spec: MultiClusterHubSpec) -> MultiClusterHub {
    MultiClusterHub {
        metadata: ObjectMeta {
            name: Some(TEST_HUB_NAME.to_string()),
            namespace: Some(TEST_HUB_NAMESPACE.to_string()),
            uid: Some("hub-uid".to_string()),
            generation: Some(1),
            finalizers: Some(vec![HUB_FINALIZER.to_string()]),
            ..Default::default()
        },
        spec,
        status: None,
    }
}

/// A hub with default spec.
pub fn hub() -> MultiClusterHub {
    hub_with_spec(MultiClusterHubSpec::default())
}

/// Convert a hub into the dynamic representation kept by the store.
pub fn hub_object(hub: &MultiClusterHub) -> DynamicObject {
    let mut value = serde_json::to_value(hub).unwrap();
    value["apiVersion"] = json!(crate::constants::API_GROUP_VERSION);
    value["kind"] = json!(crate::constants::KIND_MULTICLUSTERHUB);
    serde_json::from_value(value).unwrap()
}

/// Build a dynamic object from a JSON literal.
pub fn object(value: Value) -> DynamicObject {
    serde_json::from_value(value).unwrap()
}

/// A deployment reporting all replicas available.
pub fn available_deployment(name: &str, namespace: &str) -> DynamicObject {
    object(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {"replicas": 1},
        "status": {
            "replicas": 1,
            "availableReplicas": 1,
            "conditions": [{"type": "Available", "status": "True"}]
        }
    }))
}

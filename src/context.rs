// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the hub controller.
//!
//! Every reconciliation receives an `Arc<Context>` that contains:
//! - the object store used for all cluster reads and writes
//! - the operator configuration
//! - the manifest reader for CRD, template and image manifest files
//! - the controller-instance cache of resolved values ([`CacheSpec`])
//!
//! The cache sits behind an async mutex that a pass holds from start to finish,
//! so passes for different hubs never interleave their cache updates.

use crate::config::OperatorConfig;
use crate::manifests::{FsManifestReader, ManifestReader};
use crate::store::{KubeObjectStore, ObjectStore};
use kube::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Values resolved once per pass or memoized across passes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheSpec {
    /// Resolved image key → image reference
    pub image_overrides: BTreeMap<String, String>,

    /// Version of the image manifest the overrides were loaded from
    pub manifest_version: String,

    /// Image repository override from hub annotations
    pub image_repository: String,

    /// Image overrides config map name from hub annotations
    pub image_overrides_cm: String,

    /// Cluster ingress domain; memoized once non-empty
    pub ingress_domain: String,

    /// Platform version; memoized once non-empty
    pub platform_version: String,
}

/// Shared context passed to the hub controller.
pub struct Context {
    /// Object store for all cluster reads and writes
    pub store: Arc<dyn ObjectStore>,

    /// Operator configuration
    pub config: OperatorConfig,

    /// Reader for manifest directories
    pub manifests: Arc<dyn ManifestReader>,

    /// Controller-instance cache, held for the duration of a pass
    pub cache: Mutex<CacheSpec>,
}

impl Context {
    /// Build a context over an arbitrary store and reader.
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        config: OperatorConfig,
        manifests: Arc<dyn ManifestReader>,
    ) -> Self {
        Self {
            store,
            config,
            manifests,
            cache: Mutex::new(CacheSpec::default()),
        }
    }

    /// Production context talking to the API server and reading the local filesystem.
    #[must_use]
    pub fn from_client(client: Client, config: OperatorConfig) -> Self {
        Self::new(
            Arc::new(KubeObjectStore::new(client)),
            config,
            Arc::new(FsManifestReader),
        )
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;

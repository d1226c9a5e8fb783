// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Image override resolution.
//!
//! Layers, in order:
//! 1. Base map: the `OPERAND_IMAGE_<KEY>` environment variables when any is
//!    set, otherwise the image manifest `<manifests>/<version>.json`.
//! 2. The oauth proxy image matching the platform version.
//! 3. The `mch-imageRepository` annotation replaces the repository of every
//!    image.
//! 4. The config map named by the `mch-imageOverridesCM` annotation overwrites
//!    individual keys.

use crate::constants::{
    ENV_OPERAND_IMAGE_PREFIX, OAUTH_PROXY_CURRENT_KEY, OAUTH_PROXY_CURRENT_MIN_PLATFORM_VERSION,
    OAUTH_PROXY_KEY, OAUTH_PROXY_LEGACY_KEY,
};
use crate::crd::MultiClusterHub;
use crate::errors::{HubError, HubResult};
use crate::kinds;
use crate::labels::OVERRIDES_CM_KEY;
use crate::manifests::{load_image_manifest, ImageManifestEntry, ManifestReader};
use crate::reconcilers::defaults::version_at_least;
use crate::store::ObjectStore;
use kube::ResourceExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Image overrides taken from `OPERAND_IMAGE_<KEY>` variables.
///
/// Keys are lower-cased with the prefix removed; empty values are ignored.
pub fn env_image_overrides<I>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(_, value)| !value.is_empty())
        .filter_map(|(key, value)| {
            key.strip_prefix(ENV_OPERAND_IMAGE_PREFIX)
                .filter(|k| !k.is_empty())
                .map(|k| (k.to_ascii_lowercase(), value))
        })
        .collect()
}

/// Overrides stored in the hub's image overrides config map.
///
/// # Errors
///
/// Returns a configuration error if the config map is missing or its
/// `manifest.json` entry cannot be parsed.
pub async fn configmap_image_overrides(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
) -> HubResult<BTreeMap<String, String>> {
    let cm = store
        .get(&kinds::config_map(), Some(namespace), name)
        .await?
        .ok_or_else(|| {
            HubError::config(format!(
                "image overrides config map {namespace}/{name} not found"
            ))
        })?;

    let Some(manifest) = cm
        .data
        .get("data")
        .and_then(|d| d.get(OVERRIDES_CM_KEY))
        .and_then(Value::as_str)
    else {
        return Ok(BTreeMap::new());
    };

    let entries: Vec<ImageManifestEntry> = serde_json::from_str(manifest).map_err(|e| {
        HubError::config(format!(
            "invalid {OVERRIDES_CM_KEY} in config map {namespace}/{name}: {e}"
        ))
    })?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            let reference = entry.reference();
            (entry.image_key, reference)
        })
        .collect())
}

/// Point `oauth_proxy` at the image built for the platform version.
///
/// An unknown platform version or a missing source image leaves the map as is.
pub fn select_oauth_image(images: &mut BTreeMap<String, String>, platform_version: &str) {
    if platform_version.is_empty() {
        return;
    }
    let source = if version_at_least(platform_version, OAUTH_PROXY_CURRENT_MIN_PLATFORM_VERSION) {
        OAUTH_PROXY_CURRENT_KEY
    } else {
        OAUTH_PROXY_LEGACY_KEY
    };
    if let Some(image) = images.get(source).cloned() {
        debug!("Using {} as {} for platform {}", source, OAUTH_PROXY_KEY, platform_version);
        images.insert(OAUTH_PROXY_KEY.to_string(), image);
    }
}

/// Replace the repository of every image reference with `repository`.
///
/// `quay.io/stolostron/console:2.5.0` becomes `<repository>/console:2.5.0`.
pub fn override_image_repository(images: &mut BTreeMap<String, String>, repository: &str) {
    let repository = repository.trim_end_matches('/');
    for reference in images.values_mut() {
        let image = reference
            .rsplit_once('/')
            .map_or(reference.as_str(), |(_, image)| image);
        *reference = format!("{repository}/{image}");
    }
}

/// Resolve the image overrides for `hub` at `version`.
///
/// # Errors
///
/// Propagates manifest and config map failures.
pub async fn resolve_image_overrides(
    store: &dyn ObjectStore,
    manifests: &dyn ManifestReader,
    manifests_dir: &Path,
    version: &str,
    platform_version: &str,
    hub: &MultiClusterHub,
    env: BTreeMap<String, String>,
) -> HubResult<BTreeMap<String, String>> {
    let mut images = if env.is_empty() {
        debug!("No image overrides in the environment, reading the image manifest");
        load_image_manifest(manifests, manifests_dir, version).await?
    } else {
        debug!("Using {} image override(s) from the environment", env.len());
        env
    };

    select_oauth_image(&mut images, platform_version);

    if let Some(repository) = hub.image_repository() {
        info!("Overriding image repository with {}", repository);
        override_image_repository(&mut images, repository);
    }

    if let Some(cm_name) = hub.image_overrides_configmap() {
        let namespace = hub.namespace().unwrap_or_default();
        let overrides = configmap_image_overrides(store, &namespace, cm_name).await?;
        info!(
            "Applying {} image override(s) from config map {}/{}",
            overrides.len(),
            namespace,
            cm_name
        );
        images.extend(overrides);
    }

    Ok(images)
}

#[cfg(test)]
#[path = "overrides_tests.rs"]
mod overrides_tests;

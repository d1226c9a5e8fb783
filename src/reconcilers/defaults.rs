// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Defaulting of the hub spec.
//!
//! Defaulting runs at the start of every pass. When it changes the spec, the
//! orchestrator persists the hub and ends the pass so the next pass starts
//! from the stored, defaulted spec.

use crate::constants::DEFAULT_SSL_CIPHERS;
use crate::crd::{AvailabilityType, ComponentConfig, MultiClusterHubSpec};
use crate::reconcilers::components::{
    COMPONENTS, COMPONENT_CLUSTER_BACKUP, COMPONENT_CLUSTER_PROXY_ADDON,
};
use tracing::debug;

/// Collapse repeated component entries into one.
///
/// The last entry for a name decides its enablement; the entry keeps the
/// position of the first occurrence.
fn dedupe_components(components: &mut Vec<ComponentConfig>) {
    let mut unique: Vec<ComponentConfig> = Vec::with_capacity(components.len());
    for entry in components.drain(..) {
        if let Some(existing) = unique.iter_mut().find(|c| c.name == entry.name) {
            existing.enabled = entry.enabled;
        } else {
            unique.push(entry);
        }
    }
    *components = unique;
}

/// Move the deprecated boolean toggles into `overrides.components`.
fn migrate_deprecated_toggles(spec: &mut MultiClusterHubSpec) {
    if let Some(enabled) = spec.enable_cluster_backup.take() {
        debug!("Migrating enableClusterBackup={enabled} into overrides.components");
        spec.set_enabled(COMPONENT_CLUSTER_BACKUP, enabled);
    }
    if let Some(enabled) = spec.enable_cluster_proxy_addon.take() {
        debug!("Migrating enableClusterProxyAddon={enabled} into overrides.components");
        spec.set_enabled(COMPONENT_CLUSTER_PROXY_ADDON, enabled);
    }
}

/// Apply every default to `spec`; returns whether anything changed.
pub fn apply_defaults(spec: &mut MultiClusterHubSpec) -> bool {
    let before = spec.clone();

    if let Some(overrides) = spec.overrides.as_mut() {
        dedupe_components(&mut overrides.components);
    }

    migrate_deprecated_toggles(spec);

    for def in COMPONENTS {
        if !spec.has_component(def.name) {
            spec.set_enabled(def.name, def.enabled_by_default);
        }
    }

    if spec.ingress.ssl_ciphers.is_empty() {
        spec.ingress.ssl_ciphers = DEFAULT_SSL_CIPHERS.iter().map(ToString::to_string).collect();
    }

    if spec.availability_config.is_none() {
        spec.availability_config = Some(AvailabilityType::High);
    }

    *spec != before
}

/// Parse the leading `major.minor` of a platform version string.
#[must_use]
pub fn parse_major_minor(version: &str) -> Option<(u64, u64)> {
    let mut parts = version.trim_start_matches('v').split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor))
}

/// Whether `version` is at least `minimum`; unparsable versions are not.
#[must_use]
pub fn version_at_least(version: &str, minimum: (u64, u64)) -> bool {
    parse_major_minor(version).is_some_and(|v| v >= minimum)
}

#[cfg(test)]
#[path = "defaults_tests.rs"]
mod defaults_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `defaults.rs`

#[cfg(test)]
mod tests {
    use crate::constants::DEFAULT_SSL_CIPHERS;
    use crate::crd::{AvailabilityType, ComponentConfig, MultiClusterHubSpec, Overrides};
    use crate::reconcilers::components::COMPONENTS;
    use crate::reconcilers::defaults::{apply_defaults, parse_major_minor, version_at_least};

    fn entry(name: &str, enabled: bool) -> ComponentConfig {
        ComponentConfig {
            name: name.to_string(),
            enabled,
        }
    }

    #[test]
    fn test_empty_spec_gets_every_default() {
        let mut spec = MultiClusterHubSpec::default();
        assert!(apply_defaults(&mut spec));

        let components = &spec.overrides.as_ref().unwrap().components;
        assert_eq!(components.len(), COMPONENTS.len());
        assert!(spec.is_enabled("search"));
        assert!(!spec.is_enabled("cluster-backup"));
        assert_eq!(spec.ingress.ssl_ciphers.len(), DEFAULT_SSL_CIPHERS.len());
        assert_eq!(spec.availability_config, Some(AvailabilityType::High));
    }

    #[test]
    fn test_defaulted_spec_is_stable() {
        let mut spec = MultiClusterHubSpec::default();
        apply_defaults(&mut spec);
        let once = spec.clone();
        assert!(!apply_defaults(&mut spec));
        assert_eq!(spec, once);
    }

    #[test]
    fn test_explicit_choices_are_kept() {
        let mut spec = MultiClusterHubSpec {
            availability_config: Some(AvailabilityType::Basic),
            overrides: Some(Overrides {
                image_pull_policy: None,
                components: vec![entry("search", false)],
            }),
            ..Default::default()
        };
        apply_defaults(&mut spec);
        assert!(!spec.is_enabled("search"));
        assert_eq!(spec.availability(), AvailabilityType::Basic);
    }

    #[test]
    fn test_duplicates_collapse_last_wins() {
        let mut spec = MultiClusterHubSpec {
            overrides: Some(Overrides {
                image_pull_policy: None,
                components: vec![entry("search", true), entry("console", true), entry("search", false)],
            }),
            ..Default::default()
        };
        apply_defaults(&mut spec);

        let components = &spec.overrides.as_ref().unwrap().components;
        assert_eq!(components.iter().filter(|c| c.name == "search").count(), 1);
        assert_eq!(components[0].name, "search");
        assert!(!spec.is_enabled("search"));
    }

    #[test]
    fn test_deprecated_toggles_are_migrated_and_cleared() {
        let mut spec = MultiClusterHubSpec {
            enable_cluster_backup: Some(true),
            enable_cluster_proxy_addon: Some(false),
            ..Default::default()
        };
        assert!(apply_defaults(&mut spec));
        assert!(spec.is_enabled("cluster-backup"));
        assert!(!spec.is_enabled("cluster-proxy-addon"));
        assert!(spec.enable_cluster_backup.is_none());
        assert!(spec.enable_cluster_proxy_addon.is_none());
    }

    #[test]
    fn test_platform_versions() {
        assert_eq!(parse_major_minor("4.10.3"), Some((4, 10)));
        assert_eq!(parse_major_minor("v4.9"), Some((4, 9)));
        assert_eq!(parse_major_minor("4.11.0-rc.1"), Some((4, 11)));
        assert_eq!(parse_major_minor("garbage"), None);
        assert!(version_at_least("4.10.0", (4, 10)));
        assert!(version_at_least("5.0", (4, 10)));
        assert!(!version_at_least("4.9.12", (4, 10)));
        assert!(!version_at_least("", (4, 10)));
    }
}

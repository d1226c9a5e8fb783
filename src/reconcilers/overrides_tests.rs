// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `overrides.rs`

#[cfg(test)]
mod tests {
    use crate::labels::{ANNOTATION_IMAGE_OVERRIDES_CM, ANNOTATION_IMAGE_REPOSITORY};
    use crate::manifests::FsManifestReader;
    use crate::reconcilers::overrides::{
        env_image_overrides, override_image_repository, resolve_image_overrides,
        select_oauth_image,
    };
    use crate::testing::{hub, object, MemoryStore, TEST_HUB_NAMESPACE};
    use kube::api::DynamicObject;
    use kube::ResourceExt;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"[
        {"image-key": "search_api", "image-remote": "quay.io/stolostron", "image-name": "search-api", "image-tag": "2.5.0"},
        {"image-key": "console", "image-remote": "quay.io/stolostron", "image-name": "console", "image-tag": "2.5.0"}
    ]"#;

    fn manifests_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("2.5.0.json"), MANIFEST).unwrap();
        dir
    }

    #[test]
    fn test_env_overrides_strip_prefix_and_skip_empty() {
        let env = env_image_overrides(vec![
            ("OPERAND_IMAGE_SEARCH_API".to_string(), "img:env".to_string()),
            ("OPERAND_IMAGE_CONSOLE".to_string(), String::new()),
            ("OPERAND_IMAGE_".to_string(), "nameless".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ]);
        assert_eq!(env, BTreeMap::from([("search_api".to_string(), "img:env".to_string())]));
    }

    fn dev_overrides_configmap() -> DynamicObject {
        object(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "dev-overrides", "namespace": TEST_HUB_NAMESPACE},
            "data": {
                "manifest.json": r#"[{"image-key": "search_api", "image-remote": "dev.local", "image-name": "search-api", "image-tag": "dev"}]"#
            }
        }))
    }

    #[tokio::test]
    async fn test_env_replaces_manifest_as_base() {
        let dir = manifests_dir();
        let store = MemoryStore::new();
        let env = BTreeMap::from([("search_api".to_string(), "img:env".to_string())]);

        let images = resolve_image_overrides(
            &store,
            &FsManifestReader,
            dir.path(),
            "2.5.0",
            "",
            &hub(),
            env.clone(),
        )
        .await
        .unwrap();
        assert_eq!(images, env);
    }

    #[tokio::test]
    async fn test_env_base_with_repository_annotation() {
        let dir = manifests_dir();
        let store = MemoryStore::new();
        let mut hub = hub();
        hub.annotations_mut().insert(
            ANNOTATION_IMAGE_REPOSITORY.to_string(),
            "mirror.local/acm".to_string(),
        );
        let env = BTreeMap::from([(
            "search_api".to_string(),
            "quay.io/stolostron/search-api:env".to_string(),
        )]);

        let images = resolve_image_overrides(
            &store,
            &FsManifestReader,
            dir.path(),
            "2.5.0",
            "",
            &hub,
            env,
        )
        .await
        .unwrap();
        assert_eq!(images["search_api"], "mirror.local/acm/search-api:env");
    }

    #[tokio::test]
    async fn test_configmap_wins_over_env_and_repository() {
        let dir = manifests_dir();
        let store = MemoryStore::new();
        store.insert(dev_overrides_configmap());
        let mut hub = hub();
        hub.annotations_mut().insert(
            ANNOTATION_IMAGE_REPOSITORY.to_string(),
            "mirror.local/acm".to_string(),
        );
        hub.annotations_mut().insert(
            ANNOTATION_IMAGE_OVERRIDES_CM.to_string(),
            "dev-overrides".to_string(),
        );
        let env = BTreeMap::from([
            (
                "search_api".to_string(),
                "quay.io/stolostron/search-api:env".to_string(),
            ),
            ("console".to_string(), "quay.io/stolostron/console:env".to_string()),
        ]);

        let images = resolve_image_overrides(
            &store,
            &FsManifestReader,
            dir.path(),
            "2.5.0",
            "",
            &hub,
            env,
        )
        .await
        .unwrap();
        assert_eq!(images["search_api"], "dev.local/search-api:dev");
        assert_eq!(images["console"], "mirror.local/acm/console:env");
    }

    #[test]
    fn test_override_image_repository_keeps_name_tag_and_digest() {
        let mut images = BTreeMap::from([
            ("a".to_string(), "quay.io/stolostron/console:2.5.0".to_string()),
            ("b".to_string(), "registry.io:5000/org/team/search@sha256:abc".to_string()),
            ("c".to_string(), "bare:1".to_string()),
        ]);
        override_image_repository(&mut images, "mirror.local/acm/");
        assert_eq!(images["a"], "mirror.local/acm/console:2.5.0");
        assert_eq!(images["b"], "mirror.local/acm/search@sha256:abc");
        assert_eq!(images["c"], "mirror.local/acm/bare:1");
    }

    #[test]
    fn test_oauth_image_follows_platform_version() {
        let base = BTreeMap::from([
            ("oauth_proxy_48".to_string(), "oauth:48".to_string()),
            ("oauth_proxy_49_and_up".to_string(), "oauth:49".to_string()),
        ]);

        let mut legacy = base.clone();
        select_oauth_image(&mut legacy, "4.8.12");
        assert_eq!(legacy["oauth_proxy"], "oauth:48");

        let mut current = base.clone();
        select_oauth_image(&mut current, "4.10.3");
        assert_eq!(current["oauth_proxy"], "oauth:49");

        let mut unknown = base.clone();
        select_oauth_image(&mut unknown, "");
        assert!(!unknown.contains_key("oauth_proxy"));
    }

    #[tokio::test]
    async fn test_manifest_with_repository_annotation() {
        let dir = manifests_dir();
        let store = MemoryStore::new();
        let mut hub = hub();
        hub.annotations_mut().insert(
            ANNOTATION_IMAGE_REPOSITORY.to_string(),
            "mirror.local/acm".to_string(),
        );

        let images = resolve_image_overrides(
            &store,
            &FsManifestReader,
            dir.path(),
            "2.5.0",
            "",
            &hub,
            BTreeMap::new(),
        )
        .await
        .unwrap();
        assert_eq!(images["search_api"], "mirror.local/acm/search-api:2.5.0");
    }

    #[tokio::test]
    async fn test_configmap_overwrites_individual_keys() {
        let dir = manifests_dir();
        let store = MemoryStore::new();
        store.insert(object(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "my-overrides", "namespace": TEST_HUB_NAMESPACE},
            "data": {
                "manifest.json": r#"[{"image-key": "console", "image-remote": "registry.local", "image-name": "console", "image-digest": "sha256:feed"}]"#
            }
        })));
        let mut hub = hub();
        hub.annotations_mut().insert(
            ANNOTATION_IMAGE_OVERRIDES_CM.to_string(),
            "my-overrides".to_string(),
        );

        let images = resolve_image_overrides(
            &store,
            &FsManifestReader,
            dir.path(),
            "2.5.0",
            "",
            &hub,
            BTreeMap::new(),
        )
        .await
        .unwrap();
        assert_eq!(images["console"], "registry.local/console@sha256:feed");
        assert_eq!(images["search_api"], "quay.io/stolostron/search-api:2.5.0");
    }

    #[tokio::test]
    async fn test_missing_configmap_is_config_error() {
        let dir = manifests_dir();
        let store = MemoryStore::new();
        let mut hub = hub();
        hub.annotations_mut().insert(
            ANNOTATION_IMAGE_OVERRIDES_CM.to_string(),
            "absent".to_string(),
        );

        let err = resolve_image_overrides(
            &store,
            &FsManifestReader,
            dir.path(),
            "2.5.0",
            "",
            &hub,
            BTreeMap::new(),
        )
        .await
        .unwrap_err();
        assert!(err.condition_reason().is_some());
    }
}

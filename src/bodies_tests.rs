// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `bodies.rs`

#[cfg(test)]
mod tests {
    use crate::bodies::{
        chart_subscription, console_with_plugin, console_without_plugin,
        image_manifest_configmap, local_cluster, multicluster_engine, repo_deployment,
        ChartSubscription, RenderContext,
    };
    use crate::constants::BACKUP_NAMESPACE;
    use crate::crd::{AvailabilityType, MultiClusterHubSpec, Overrides};
    use crate::testing::{hub_with_spec, TEST_HUB_NAMESPACE};
    use kube::ResourceExt;
    use std::collections::BTreeMap;

    const SEARCH: ChartSubscription = ChartSubscription {
        name: "search-prod-sub",
        chart: "search-prod",
        in_backup_namespace: false,
        image_keys: &["search_api"],
    };

    fn images() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("search_api".to_string(), "quay.io/search-api:1".to_string()),
            ("console".to_string(), "quay.io/console:1".to_string()),
        ])
    }

    #[test]
    fn test_subscription_carries_only_its_images() {
        let hub = hub_with_spec(MultiClusterHubSpec {
            image_pull_secret: Some("pull".to_string()),
            ..Default::default()
        });
        let images = images();
        let ctx = RenderContext {
            hub: &hub,
            images: &images,
            ingress_domain: "apps.example.com",
            platform_version: "",
        };

        let sub = chart_subscription(&ctx, &SEARCH, "search");
        assert_eq!(sub.namespace().as_deref(), Some(TEST_HUB_NAMESPACE));
        assert_eq!(
            sub.data["spec"]["channel"],
            format!("{TEST_HUB_NAMESPACE}/charts-v1")
        );
        let values = &sub.data["spec"]["packageOverrides"][0]["packageOverrides"][0]["value"];
        assert_eq!(values["global"]["imageOverrides"]["search_api"], "quay.io/search-api:1");
        assert!(values["global"]["imageOverrides"].get("console").is_none());
        assert_eq!(values["global"]["pullSecret"], "pull");
        assert_eq!(values["hubconfig"]["replicaCount"], 2);
        assert_eq!(values["ingress"]["domain"], "apps.example.com");
    }

    #[test]
    fn test_backup_subscription_namespace() {
        let chart = ChartSubscription {
            in_backup_namespace: true,
            ..SEARCH
        };
        assert_eq!(chart.namespace(TEST_HUB_NAMESPACE), BACKUP_NAMESPACE);
    }

    #[test]
    fn test_repo_deployment_follows_availability_and_pull_policy() {
        let hub = hub_with_spec(MultiClusterHubSpec {
            availability_config: Some(AvailabilityType::Basic),
            overrides: Some(Overrides {
                image_pull_policy: Some("Always".to_string()),
                components: Vec::new(),
            }),
            ..Default::default()
        });
        let images = BTreeMap::from([(
            "multiclusterhub_repo".to_string(),
            "quay.io/repo:1".to_string(),
        )]);
        let ctx = RenderContext {
            hub: &hub,
            images: &images,
            ingress_domain: "",
            platform_version: "",
        };

        let deployment = repo_deployment(&ctx, "multiclusterhub-repo");
        assert_eq!(deployment.data["spec"]["replicas"], 1);
        let container = &deployment.data["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["image"], "quay.io/repo:1");
        assert_eq!(container["imagePullPolicy"], "Always");
    }

    #[test]
    fn test_engine_reflects_hub_settings() {
        let hub = hub_with_spec(MultiClusterHubSpec {
            availability_config: Some(AvailabilityType::Basic),
            image_pull_secret: Some("pull".to_string()),
            ..Default::default()
        });
        let images = BTreeMap::new();
        let ctx = RenderContext {
            hub: &hub,
            images: &images,
            ingress_domain: "",
            platform_version: "",
        };
        let engine = multicluster_engine(&ctx);
        assert!(engine.namespace().is_none());
        assert_eq!(engine.data["spec"]["availabilityConfig"], "Basic");
        assert_eq!(engine.data["spec"]["imagePullSecret"], "pull");
        assert!(engine.data["spec"]["overrides"].get("imagePullPolicy").is_none());
    }

    fn engine_component(engine: &kube::api::DynamicObject, name: &str) -> bool {
        engine.data["spec"]["overrides"]["components"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == name)
            .unwrap()["enabled"]
            .as_bool()
            .unwrap()
    }

    #[test]
    fn test_engine_overrides_follow_hub_components() {
        let mut spec = MultiClusterHubSpec {
            overrides: Some(Overrides {
                image_pull_policy: Some("IfNotPresent".to_string()),
                components: Vec::new(),
            }),
            ..Default::default()
        };
        spec.set_enabled("console", true);
        spec.set_enabled("cluster-proxy-addon", false);
        let hub = hub_with_spec(spec);
        let images = BTreeMap::new();
        let mut ctx = RenderContext {
            hub: &hub,
            images: &images,
            ingress_domain: "",
            platform_version: "4.12.3",
        };

        let engine = multicluster_engine(&ctx);
        assert_eq!(engine.data["spec"]["overrides"]["imagePullPolicy"], "IfNotPresent");
        assert!(engine_component(&engine, "console-mce"));
        assert!(!engine_component(&engine, "cluster-proxy-addon"));

        ctx.platform_version = "4.9.0";
        let engine = multicluster_engine(&ctx);
        assert!(!engine_component(&engine, "console-mce"));

        let mut toggled = hub.clone();
        toggled.spec.set_enabled("console", false);
        toggled.spec.set_enabled("cluster-proxy-addon", true);
        let ctx = RenderContext {
            hub: &toggled,
            platform_version: "4.12.3",
            ..ctx
        };
        let engine = multicluster_engine(&ctx);
        assert!(!engine_component(&engine, "console-mce"));
        assert!(engine_component(&engine, "cluster-proxy-addon"));
    }

    #[test]
    fn test_local_cluster_is_labelled() {
        let cluster = local_cluster();
        assert_eq!(cluster.labels()["local-cluster"], "true");
        assert_eq!(cluster.data["spec"]["hubAcceptsClient"], true);
    }

    #[test]
    fn test_console_plugin_list_edits() {
        let live = vec!["other".to_string()];
        let added = console_with_plugin(&live, "acm").unwrap();
        assert_eq!(added.data["spec"]["plugins"], serde_json::json!(["other", "acm"]));
        assert!(console_with_plugin(&["acm".to_string()], "acm").is_none());

        let removed = console_without_plugin(&["other".to_string(), "acm".to_string()], "acm")
            .unwrap();
        assert_eq!(removed.data["spec"]["plugins"], serde_json::json!(["other"]));
        assert!(console_without_plugin(&live, "acm").is_none());
    }

    #[test]
    fn test_image_manifest_configmap_name() {
        let cm = image_manifest_configmap(TEST_HUB_NAMESPACE, "2.5.0", &images());
        assert_eq!(cm.name_any(), "mch-image-manifest-2.5.0");
        assert_eq!(cm.data["data"]["console"], "quay.io/console:1");
    }
}

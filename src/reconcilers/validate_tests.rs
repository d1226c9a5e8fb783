// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `validate.rs`

#[cfg(test)]
mod tests {
    use crate::reconcilers::validate::{
        allow_list, contains, validate, validate_paths, ADOPTION_PATHS,
    };
    use crate::testing::merge_patch;
    use serde_json::json;

    fn appsub(channel: &str, pull_secret: &str) -> serde_json::Value {
        json!({
            "apiVersion": "apps.open-cluster-management.io/v1",
            "kind": "Subscription",
            "metadata": {"name": "search-prod-sub", "namespace": "ocm"},
            "spec": {
                "channel": channel,
                "name": "search-prod",
                "packageOverrides": [{
                    "packageName": "search-prod",
                    "packageOverrides": [{"path": "spec", "value": {"global": {"pullSecret": pull_secret}}}]
                }]
            }
        })
    }

    #[test]
    fn test_unchanged_returns_live() {
        let live = appsub("ocm/charts", "secret");
        let result = validate(&live, &appsub("ocm/charts", "secret"));
        assert!(!result.changed);
        assert_eq!(result.merged, live);
        assert_eq!(result.patch, json!({}));
    }

    #[test]
    fn test_modified_pull_secret_is_detected() {
        let live = appsub("ocm/charts", "old");
        let desired = appsub("ocm/charts", "new");
        let result = validate(&live, &desired);
        assert!(result.changed);
        assert_eq!(result.merged["spec"]["packageOverrides"], desired["spec"]["packageOverrides"]);
        assert!(result.patch["spec"].get("channel").is_none());
    }

    #[test]
    fn test_only_allow_listed_paths_change() {
        let live = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "d", "namespace": "ns", "annotations": {"keep": "me"}},
            "spec": {"replicas": 1, "strategy": {"type": "Recreate"}},
            "status": {"availableReplicas": 1}
        });
        let desired = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "d", "namespace": "ns", "annotations": {"other": "x"}},
            "spec": {"replicas": 3, "strategy": {"type": "RollingUpdate"}}
        });

        let result = validate(&live, &desired);
        assert!(result.changed);
        assert_eq!(result.merged["spec"]["replicas"], 3);
        assert_eq!(result.merged["spec"]["strategy"]["type"], "Recreate");
        assert_eq!(result.merged["metadata"]["annotations"], json!({"keep": "me"}));
        assert_eq!(result.merged["status"], live["status"]);
        assert_eq!(result.patch, json!({"spec": {"replicas": 3}}));
    }

    #[test]
    fn test_absent_in_live_counts_as_changed() {
        let live = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "c"}});
        let desired = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "c"}, "data": {"a": "1"}});
        let result = validate(&live, &desired);
        assert!(result.changed);
        assert_eq!(result.merged["data"], json!({"a": "1"}));
    }

    #[test]
    fn test_server_defaults_are_not_drift() {
        let live = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "spec": {"template": {"spec": {"containers": [{
                "name": "c",
                "image": "img:1",
                "terminationMessagePath": "/dev/termination-log"
            }]}}}
        });
        let desired = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "spec": {"template": {"spec": {"containers": [{"name": "c", "image": "img:1"}]}}}
        });
        assert!(!validate(&live, &desired).changed);
    }

    #[test]
    fn test_patch_applied_to_live_yields_merged() {
        let live = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "spec": {"template": {
                "metadata": {"labels": {"app": "a", "stale": "x"}},
                "spec": {"containers": [{"name": "c", "image": "img:1"}]}
            }}
        });
        let desired = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "spec": {"template": {
                "metadata": {"labels": {"app": "b"}},
                "spec": {"containers": [{"name": "c", "image": "img:2"}]}
            }}
        });

        let result = validate(&live, &desired);
        let mut patched = live.clone();
        merge_patch(&mut patched, &result.patch);
        assert_eq!(patched, result.merged);
        assert!(!validate(&patched, &desired).changed);
    }

    #[test]
    fn test_dotted_label_keys_are_addressable() {
        let live = json!({"metadata": {"labels": {"installer.name": "old"}}});
        let desired = json!({"metadata": {"labels": {"installer.name": "hub", "installer.namespace": "ns"}}});
        let result = validate_paths(&live, &desired, ADOPTION_PATHS);
        assert!(result.changed);
        assert_eq!(result.merged["metadata"]["labels"]["installer.name"], "hub");
        assert_eq!(result.merged["metadata"]["labels"]["installer.namespace"], "ns");
    }

    #[test]
    fn test_namespace_is_never_patched() {
        assert!(allow_list("v1", "Namespace").is_empty());
        let live = json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"labels": {}}});
        let desired = json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"labels": {"a": "b"}}});
        assert!(!validate(&live, &desired).changed);
    }

    #[test]
    fn test_olm_and_appsub_lists_differ() {
        let olm = allow_list("operators.coreos.com/v1alpha1", "Subscription");
        let appsub = allow_list("apps.open-cluster-management.io/v1", "Subscription");
        assert!(olm.iter().any(|p| p.contains(&"sourceNamespace")));
        assert!(!appsub.iter().any(|p| p.contains(&"sourceNamespace")));
    }

    #[test]
    fn test_contains_arrays_require_same_length() {
        let live = json!([1, 2, 3]);
        assert!(!contains(Some(&live), &json!([1, 2])));
        assert!(contains(Some(&live), &json!([1, 2, 3])));
    }
}

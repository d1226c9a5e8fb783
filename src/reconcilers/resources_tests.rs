// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{ConditionStatus, ConditionType};
    use crate::errors::{HubError, StoreError};
    use crate::kinds;
    use crate::reconcilers::resources::{ensure_absent, ensure_present, Change};
    use crate::reconcilers::status::find_condition;
    use crate::status_reasons::{REASON_FAILED_CREATE, REASON_NEW_COMPONENT};
    use crate::testing::{hub, object, MemoryStore, Verb, TEST_HUB_NAME, TEST_HUB_NAMESPACE};
    use serde_json::json;

    fn deployment(namespace: &str, replicas: i64) -> kube::api::DynamicObject {
        object(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "search-api", "namespace": namespace},
            "spec": {"replicas": replicas}
        }))
    }

    #[tokio::test]
    async fn test_create_in_hub_namespace_stamps_owner_and_labels() {
        let store = MemoryStore::new();
        let hub = hub();
        let mut conditions = Vec::new();

        let change = ensure_present(&store, &hub, &mut conditions, &deployment(TEST_HUB_NAMESPACE, 1))
            .await
            .unwrap();
        assert_eq!(change, Change::Created);

        let stored = store
            .object(&kinds::deployment(), Some(TEST_HUB_NAMESPACE), "search-api")
            .unwrap();
        assert_eq!(stored["metadata"]["labels"]["installer.name"], TEST_HUB_NAME);
        assert_eq!(stored["metadata"]["labels"]["installer.namespace"], TEST_HUB_NAMESPACE);
        let owner = &stored["metadata"]["ownerReferences"][0];
        assert_eq!(owner["kind"], "MultiClusterHub");
        assert_eq!(owner["controller"], true);

        let progressing = find_condition(&conditions, ConditionType::Progressing).unwrap();
        assert_eq!(progressing.status, ConditionStatus::True);
        assert_eq!(progressing.reason.as_deref(), Some(REASON_NEW_COMPONENT));
        assert_eq!(
            progressing.message.as_deref(),
            Some("created new resource: Deployment search-api")
        );
    }

    #[tokio::test]
    async fn test_create_in_other_namespace_has_labels_but_no_owner() {
        let store = MemoryStore::new();
        let mut conditions = Vec::new();

        ensure_present(&store, &hub(), &mut conditions, &deployment("other", 1))
            .await
            .unwrap();

        let stored = store
            .object(&kinds::deployment(), Some("other"), "search-api")
            .unwrap();
        assert_eq!(stored["metadata"]["labels"]["installer.name"], TEST_HUB_NAME);
        assert!(stored["metadata"].get("ownerReferences").is_none());
    }

    #[tokio::test]
    async fn test_second_call_is_unchanged() {
        let store = MemoryStore::new();
        let hub = hub();
        let mut conditions = Vec::new();
        let desired = deployment(TEST_HUB_NAMESPACE, 1);

        ensure_present(&store, &hub, &mut conditions, &desired).await.unwrap();
        let change = ensure_present(&store, &hub, &mut conditions, &desired).await.unwrap();

        assert_eq!(change, Change::Unchanged);
        assert_eq!(store.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_drift_is_patched() {
        let store = MemoryStore::new();
        let hub = hub();
        let mut conditions = Vec::new();

        ensure_present(&store, &hub, &mut conditions, &deployment(TEST_HUB_NAMESPACE, 1))
            .await
            .unwrap();
        let change = ensure_present(&store, &hub, &mut conditions, &deployment(TEST_HUB_NAMESPACE, 2))
            .await
            .unwrap();

        assert_eq!(change, Change::Updated);
        assert_eq!(store.mutations()[1].verb, Verb::Patch);
        let stored = store
            .object(&kinds::deployment(), Some(TEST_HUB_NAMESPACE), "search-api")
            .unwrap();
        assert_eq!(stored["spec"]["replicas"], 2);
        assert_eq!(stored["metadata"]["labels"]["installer.name"], TEST_HUB_NAME);
    }

    #[tokio::test]
    async fn test_permanent_create_failure_sets_condition() {
        let store = MemoryStore::new();
        store.fail_on(
            Verb::Create,
            "Deployment",
            "search-api",
            StoreError::Invalid {
                kind: "Deployment".to_string(),
                name: "search-api".to_string(),
                message: "spec.replicas: Invalid value".to_string(),
            },
        );
        let mut conditions = Vec::new();

        let err = ensure_present(&store, &hub(), &mut conditions, &deployment(TEST_HUB_NAMESPACE, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Store(StoreError::Invalid { .. })));

        let progressing = find_condition(&conditions, ConditionType::Progressing).unwrap();
        assert_eq!(progressing.status, ConditionStatus::False);
        assert_eq!(progressing.reason.as_deref(), Some(REASON_FAILED_CREATE));
    }

    #[tokio::test]
    async fn test_transient_failure_leaves_conditions_alone() {
        let store = MemoryStore::new();
        store.fail_on(
            Verb::Create,
            "Deployment",
            "search-api",
            StoreError::Transient {
                kind: "Deployment".to_string(),
                name: "search-api".to_string(),
                message: "timeout".to_string(),
            },
        );
        let mut conditions = Vec::new();

        let err = ensure_present(&store, &hub(), &mut conditions, &deployment(TEST_HUB_NAMESPACE, 1))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(conditions.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_absent_deletes_then_noops() {
        let store = MemoryStore::new();
        store.insert(deployment("ns", 1));

        assert_eq!(
            ensure_absent(&store, &deployment("ns", 1)).await.unwrap(),
            Change::Deleted
        );
        assert_eq!(
            ensure_absent(&store, &deployment("ns", 1)).await.unwrap(),
            Change::Unchanged
        );
        assert_eq!(store.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_absent_on_missing_object_issues_no_delete() {
        let store = MemoryStore::new();
        assert_eq!(
            ensure_absent(&store, &deployment("ns", 1)).await.unwrap(),
            Change::Unchanged
        );
        assert!(store.mutations().is_empty());
    }

    #[test]
    fn test_change_is_structural() {
        assert!(Change::Created.is_structural());
        assert!(Change::Updated.is_structural());
        assert!(Change::Deleted.is_structural());
        assert!(!Change::Unchanged.is_structural());
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the hub operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group of the `MultiClusterHub` CRD
pub const API_GROUP: &str = "operator.open-cluster-management.io";

/// API version of the `MultiClusterHub` CRD
pub const API_VERSION: &str = "v1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "operator.open-cluster-management.io/v1";

/// Kind name for the `MultiClusterHub` resource
pub const KIND_MULTICLUSTERHUB: &str = "MultiClusterHub";

/// Kind name for the `MultiClusterEngine` resource
pub const KIND_MULTICLUSTERENGINE: &str = "MultiClusterEngine";

/// Kind name of every CRD file installed from `CRDS_PATH`
pub const KIND_CRD: &str = "CustomResourceDefinition";

// ============================================================================
// Finalizer Constants
// ============================================================================

/// Finalizer placed on every `MultiClusterHub`
pub const HUB_FINALIZER: &str = "finalizer.operator.open-cluster-management.io";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Fixed requeue delay used while waiting on the cluster (20 seconds)
pub const RESYNC_PERIOD_SECS: u64 = 20;

/// Requeue delay applied by the controller error policy (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Number of tokio worker threads for the controller runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default bind address for the Prometheus metrics endpoint
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8383";

/// Path served by the metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

// ============================================================================
// Environment Variables
// ============================================================================

/// Directory holding the CRD YAML files to install
pub const ENV_CRDS_PATH: &str = "CRDS_PATH";

/// Directory holding the rendered base templates
pub const ENV_TEMPLATES_PATH: &str = "TEMPLATES_PATH";

/// Directory holding `<version>.json` image manifests
pub const ENV_MANIFESTS_PATH: &str = "MANIFESTS_PATH";

/// Version of the running operator
pub const ENV_OPERATOR_VERSION: &str = "OPERATOR_VERSION";

/// Set to `true` when running under a test harness
pub const ENV_UNIT_TEST: &str = "UNIT_TEST";

/// Prefix of per-image environment overrides, e.g. `OPERAND_IMAGE_CONSOLE`
pub const ENV_OPERAND_IMAGE_PREFIX: &str = "OPERAND_IMAGE_";

/// Subdirectory of `TEMPLATES_PATH` holding the hub base templates
pub const TEMPLATES_KIND: &str = "multiclusterhub";

/// Subdirectory of `TEMPLATES_PATH/<kind>` holding the base templates
pub const TEMPLATES_BASE_DIR: &str = "base";

/// Default manifest directory
pub const DEFAULT_MANIFESTS_PATH: &str = "/image-manifests";

/// Default operator version reported when `OPERATOR_VERSION` is unset
pub const DEFAULT_OPERATOR_VERSION: &str = "2.5.0";

// ============================================================================
// Namespaces and Well Known Names
// ============================================================================

/// Namespace created for the cluster-backup component
pub const BACKUP_NAMESPACE: &str = "open-cluster-management-backup";

/// Namespace holding certificate manager resources when certificates are separated
pub const CERT_MANAGER_NAMESPACE: &str = "open-cluster-management-issuer";

/// Name of the self-managed hub `ManagedCluster`
pub const LOCAL_CLUSTER_NAME: &str = "local-cluster";

/// Name of the cluster-wide singleton config objects (`ClusterVersion`, `Ingress`)
pub const CLUSTER_SINGLETON_NAME: &str = "cluster";

/// Name of the `MultiClusterEngine` managed by the hub
pub const MULTICLUSTER_ENGINE_NAME: &str = "multiclusterengine";

/// Target namespace of the `MultiClusterEngine`
pub const MULTICLUSTER_ENGINE_NAMESPACE: &str = "multicluster-engine";

/// Name of the console plugin registered with the platform console
pub const CONSOLE_PLUGIN_NAME: &str = "acm";

/// Prefix of the config map persisting the resolved image overrides
pub const IMAGE_MANIFEST_CONFIGMAP_PREFIX: &str = "mch-image-manifest-";

/// Subscription operator dependency the hub waits on before installing CRDs
pub const SUBSCRIPTION_OPERATOR_DEPLOYMENT: &str = "multicluster-operators-hub-subscription";

/// Minimum platform version that supports dynamic console plugins
pub const CONSOLE_PLUGIN_MIN_PLATFORM_VERSION: (u64, u64) = (4, 10);

/// Engine component carrying the engine console plugin
pub const ENGINE_COMPONENT_CONSOLE: &str = "console-mce";

/// Engine component carrying the cluster proxy addon
pub const ENGINE_COMPONENT_CLUSTER_PROXY_ADDON: &str = "cluster-proxy-addon";

/// Image key rendered into workloads that run the oauth proxy
pub const OAUTH_PROXY_KEY: &str = "oauth_proxy";

/// Oauth proxy image for platforms older than 4.9
pub const OAUTH_PROXY_LEGACY_KEY: &str = "oauth_proxy_48";

/// Oauth proxy image for platforms 4.9 and newer
pub const OAUTH_PROXY_CURRENT_KEY: &str = "oauth_proxy_49_and_up";

/// First platform version using [`OAUTH_PROXY_CURRENT_KEY`]
pub const OAUTH_PROXY_CURRENT_MIN_PLATFORM_VERSION: (u64, u64) = (4, 9);

// ============================================================================
// Defaulting Constants
// ============================================================================

/// Cipher suites applied when `spec.ingress.sslCiphers` is empty
pub const DEFAULT_SSL_CIPHERS: &[&str] = &[
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
];

/// Replica count used by high availability bodies
pub const HA_REPLICAS: i32 = 2;

/// Replica count used by basic availability bodies
pub const BASIC_REPLICAS: i32 = 1;

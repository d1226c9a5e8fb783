// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the hub operator.
//!
//! Two layers are defined here:
//!
//! - [`StoreError`] classifies failures of the cluster API into the small set of
//!   categories the convergence primitives act on.
//! - [`HubError`] is the error of a reconciliation pass. It carries an optional
//!   stable condition reason so the orchestrator can surface permanent failures
//!   through the `Progressing` condition.
//!
//! Transient store errors are returned without touching conditions; the
//! controller error policy requeues them.

use crate::status_reasons::{
    REASON_CONFIG_INVALID, REASON_CRD_RENDER_FAILURE, REASON_RESOURCE_RENDER_FAILURE,
};
use thiserror::Error;

/// Classified failure of an object store call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist (HTTP 404)
    #[error("{kind} {name} not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// Namespaced name of the object
        name: String,
    },

    /// Write conflict or already exists (HTTP 409)
    #[error("conflict on {kind} {name}: {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },

    /// The request was rejected by validation (HTTP 400/422)
    #[error("invalid {kind} {name}: {message}")]
    Invalid {
        kind: String,
        name: String,
        message: String,
    },

    /// The operator lacks permission (HTTP 401/403)
    #[error("forbidden on {kind} {name}: {message}")]
    Forbidden {
        kind: String,
        name: String,
        message: String,
    },

    /// Timeouts, throttling, server errors and transport failures
    #[error("transient error on {kind} {name}: {message}")]
    Transient {
        kind: String,
        name: String,
        message: String,
    },

    /// Anything else
    #[error("error on {kind} {name}: {message}")]
    Other {
        kind: String,
        name: String,
        message: String,
    },
}

impl StoreError {
    /// Classify a `kube::Error` raised while operating on `kind` `name`.
    #[must_use]
    pub fn from_kube(err: kube::Error, kind: &str, name: &str) -> Self {
        let kind = kind.to_string();
        let name = name.to_string();
        match err {
            kube::Error::Api(resp) => {
                let message = resp.message;
                match resp.code {
                    404 => Self::NotFound { kind, name },
                    409 => Self::Conflict {
                        kind,
                        name,
                        message,
                    },
                    400 | 422 => Self::Invalid {
                        kind,
                        name,
                        message,
                    },
                    401 | 403 => Self::Forbidden {
                        kind,
                        name,
                        message,
                    },
                    408 | 429 | 500..=599 => Self::Transient {
                        kind,
                        name,
                        message,
                    },
                    _ => Self::Other {
                        kind,
                        name,
                        message,
                    },
                }
            }
            kube::Error::Service(e) => Self::Transient {
                kind,
                name,
                message: e.to_string(),
            },
            kube::Error::HyperError(e) => Self::Transient {
                kind,
                name,
                message: e.to_string(),
            },
            other => Self::Other {
                kind,
                name,
                message: other.to_string(),
            },
        }
    }

    /// Whether the object was absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether retrying the same call later may succeed without any change.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Transient { .. })
    }

    /// Short label used by metrics.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Invalid { .. } => "invalid",
            Self::Forbidden { .. } => "forbidden",
            Self::Transient { .. } => "transient",
            Self::Other { .. } => "other",
        }
    }
}

/// Error of a reconciliation pass.
#[derive(Error, Debug)]
pub enum HubError {
    /// Object store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Required configuration is missing or malformed
    #[error("{message}")]
    Config {
        /// Stable condition reason
        reason: &'static str,
        /// Human readable detail
        message: String,
    },

    /// One or more manifest files could not be parsed or validated
    #[error("failed to render {} file(s) from {dir}: {}", errors.len(), errors.join("; "))]
    Render {
        /// Stable condition reason
        reason: &'static str,
        /// Directory the files were read from
        dir: String,
        /// One message per failing file
        errors: Vec<String>,
    },

    /// A teardown stage is waiting for dependents to go away
    #[error("teardown stage {stage} waiting: {message}")]
    Waiting {
        /// Name of the waiting stage
        stage: &'static str,
        message: String,
    },

    /// A teardown stage failed; the finalizer stays in place
    #[error("teardown stage {stage} failed: {source}")]
    Teardown {
        stage: &'static str,
        #[source]
        source: Box<HubError>,
    },

    /// A desired or live body could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HubError {
    /// Build a configuration error with an explicit reason.
    pub fn config_with_reason(reason: &'static str, message: impl Into<String>) -> Self {
        Self::Config {
            reason,
            message: message.into(),
        }
    }

    /// Build a configuration error with the default reason.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            reason: REASON_CONFIG_INVALID,
            message: message.into(),
        }
    }

    /// Aggregated CRD render failure.
    #[must_use]
    pub fn crd_render(dir: &str, errors: Vec<String>) -> Self {
        Self::Render {
            reason: REASON_CRD_RENDER_FAILURE,
            dir: dir.to_string(),
            errors,
        }
    }

    /// Aggregated template render failure.
    #[must_use]
    pub fn template_render(dir: &str, errors: Vec<String>) -> Self {
        Self::Render {
            reason: REASON_RESOURCE_RENDER_FAILURE,
            dir: dir.to_string(),
            errors,
        }
    }

    /// Stable condition reason for permanent failures, `None` for transient ones.
    #[must_use]
    pub fn condition_reason(&self) -> Option<&'static str> {
        match self {
            Self::Config { reason, .. } | Self::Render { reason, .. } => Some(*reason),
            Self::Store(_)
            | Self::Waiting { .. }
            | Self::Teardown { .. }
            | Self::Serialization(_) => None,
        }
    }

    /// Whether the error is expected to clear without operator intervention.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable() || e.is_not_found(),
            Self::Waiting { .. } => true,
            Self::Teardown { source, .. } => source.is_transient(),
            Self::Config { .. } | Self::Render { .. } | Self::Serialization(_) => false,
        }
    }
}

/// Result alias for reconciliation code.
pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;

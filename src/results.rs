use std::collections::HashMap;

use k8s_openapi::api::core::v1::Pod;
use kube::runtime::reflector::ObjectRef;
use thiserror::Error;

/// Outcome of a single full-eviction pod, keyed by the pod's object ref.
///
/// Every full-eviction pod has exactly one entry by the time a drain
/// returns; best-effort pods never appear.
pub type EvictionResults = HashMap<ObjectRef<Pod>, EvictionResult>;

#[derive(Debug)]
pub struct EvictionResult {
    pub timed_out: bool,
    pub error: Option<PodEvictionError>,
}

impl EvictionResult {
    pub fn succeeded() -> Self {
        Self {
            timed_out: false,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        !self.timed_out && self.error.is_none()
    }
}

#[derive(Debug, Error)]
pub enum PodEvictionError {
    /// Pessimistic seed: an earlier eviction group failed before this pod's
    /// group was reached.
    #[error("eviction was not attempted: an earlier eviction group failed")]
    NotAttempted,

    #[error("failed to evict pod within allowed timeout")]
    EvictionTimeout {
        #[source]
        last_error: Option<kube::Error>,
    },

    #[error("failed to force delete pod")]
    ForceDeleteFailed {
        #[source]
        source: kube::Error,
    },

    #[error("failed to confirm pod left the node")]
    DisappearanceCheckFailed {
        #[source]
        source: kube::Error,
    },
}

#[derive(Debug, Error)]
pub enum DrainError {
    #[error("failed to drain node {node}: [{}]", .failures.join("; "))]
    EvictionsFailed {
        node: String,
        failures: Vec<String>,
    },

    #[error("pods remaining on node {node} after drain timeout")]
    PodsRemaining { node: String },
}

impl DrainError {
    /// Transient failures are worth retrying on a later scale-down pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, DrainError::PodsRemaining { .. })
    }
}

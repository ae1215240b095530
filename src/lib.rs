mod cluster_api;
mod config;
mod drainer;
mod events;
mod evictor;
mod metrics;
mod pod_classification;
mod priority_groups;
mod results;
mod shutdown;
mod waiter;

pub use crate::cluster_api::{ClusterApi, KubeClusterApi, is_not_found_error};
pub use crate::config::Config;
pub use crate::drainer::{NodeDrainer, NodeInfo};
pub use crate::events::{
    ACTION_DRAINING, EventRecorder, KubeEventRecorder, REASON_SCALE_DOWN,
    REASON_SCALE_DOWN_FAILED,
};
pub use crate::evictor::EvictionObserver;
pub use crate::metrics::{EvictionMetrics, EvictionOutcome, MetricsSink};
pub use crate::pod_classification::{
    DS_EVICTION_ANNOTATION_KEY, MIRROR_POD_ANNOTATION_KEY, PLACEHOLDER_POD_ANNOTATION_KEY,
    pods_to_evict,
};
pub use crate::priority_groups::{EvictionGroup, GracePeriodRule, group_pods_by_priority};
pub use crate::results::{DrainError, EvictionResult, EvictionResults, PodEvictionError};
pub use crate::shutdown::Shutdown;

#[cfg(test)]
#[macro_use]
extern crate assert_matches;

#[cfg(test)]
#[macro_export]
macro_rules! from_json {
    ($($json:tt)+) => {
        ::serde_json::from_value(::serde_json::json!($($json)+)).expect("Invalid json")
    };
}

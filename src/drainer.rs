use std::sync::Arc;

use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use kube::runtime::reflector::ObjectRef;
use tracing::{debug, info};

use crate::cluster_api::ClusterApi;
use crate::config::Config;
use crate::events::EventRecorder;
use crate::evictor::{self, EvictionObserver};
use crate::metrics::MetricsSink;
use crate::pod_classification::pods_to_evict;
use crate::priority_groups::{EvictionGroup, group_pods_by_priority};
use crate::results::{DrainError, EvictionResult, EvictionResults, PodEvictionError};
use crate::shutdown::Shutdown;
use crate::waiter;

/// A node picked for scale-down together with its resident pods.
pub struct NodeInfo {
    pub node: Node,
    pub pods: Vec<Pod>,
}

impl NodeInfo {
    pub fn name(&self) -> String {
        self.node.name_any()
    }
}

pub(crate) struct DrainContext {
    pub cluster_api: Arc<dyn ClusterApi>,
    pub events: Arc<dyn EventRecorder>,
    pub metrics: Arc<dyn MetricsSink>,
    pub observer: Option<Arc<dyn EvictionObserver>>,
    pub shutdown: Shutdown,
    pub config: Config,
}

/// Removes workload tenants from a node ahead of its deletion, walking
/// priority bands from least to most important.
pub struct NodeDrainer {
    ctx: Arc<DrainContext>,
}

impl NodeDrainer {
    pub fn new(
        config: Config,
        cluster_api: Arc<dyn ClusterApi>,
        events: Arc<dyn EventRecorder>,
        metrics: Arc<dyn MetricsSink>,
        observer: Option<Arc<dyn EvictionObserver>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            ctx: Arc::new(DrainContext {
                cluster_api,
                events,
                metrics,
                observer,
                shutdown,
                config,
            }),
        }
    }

    /// Evicts every tenant pod from the node, band by band.
    ///
    /// Returns the per-pod result map next to the aggregate outcome: also on
    /// error the map covers every full-eviction pod, so callers can tell
    /// pods that were never attempted from pods that timed out.
    pub async fn drain_node(
        &self,
        node_info: &NodeInfo,
    ) -> (EvictionResults, Result<(), DrainError>) {
        self.drain_node_with_force(node_info, false).await
    }

    /// Like [`NodeDrainer::drain_node`], but full-eviction pods whose retry
    /// budget runs out are removed with a raw delete.
    pub async fn drain_node_force(
        &self,
        node_info: &NodeInfo,
    ) -> (EvictionResults, Result<(), DrainError>) {
        self.drain_node_with_force(node_info, true).await
    }

    /// Best-effort eviction of the node's daemon-set pods only.
    ///
    /// Failures are tolerated and nothing waits for the pods to actually
    /// leave the node.
    pub async fn evict_daemon_set_pods(
        &self,
        node_info: &NodeInfo,
    ) -> (EvictionResults, Result<(), DrainError>) {
        let ctx = &self.ctx;
        let node_name = node_info.name();

        let (ds_pods, _) = pods_to_evict(&node_info.pods, ctx.config.evict_ds_for_empty_nodes);
        debug!(node = %node_name, count = ds_pods.len(), "evicting daemon set pods");

        let group = EvictionGroup {
            best_effort_pods: ds_pods,
            ..EvictionGroup::default()
        };

        let mut results = EvictionResults::new();
        let outcome =
            evictor::initiate_group_evictions(ctx, &node_name, &group, false, &mut results).await;
        (results, outcome)
    }

    async fn drain_node_with_force(
        &self,
        node_info: &NodeInfo,
        force: bool,
    ) -> (EvictionResults, Result<(), DrainError>) {
        let ctx = &self.ctx;
        let node_name = node_info.name();

        let (ds_pods, tenant_pods) =
            pods_to_evict(&node_info.pods, ctx.config.evict_ds_for_occupied_nodes);
        let groups = group_pods_by_priority(
            &ctx.config.shutdown_grace_by_priority,
            tenant_pods,
            ds_pods,
            ctx.config.full_ds_eviction,
        );

        let mut results = seed_results(&groups);

        for group in &groups {
            if group.is_empty() {
                continue;
            }

            debug!(
                node = %node_name,
                ceiling = group.priority_ceiling,
                full = group.full_pods.len(),
                best_effort = group.best_effort_pods.len(),
                "draining priority band"
            );

            if let Err(err) =
                evictor::initiate_group_evictions(ctx, &node_name, group, force, &mut results)
                    .await
            {
                return (results, Err(err));
            }

            if let Err(err) = waiter::wait_pods_gone(
                ctx,
                &node_name,
                &group.full_pods,
                group.grace_seconds,
                &mut results,
            )
            .await
            {
                return (results, Err(err));
            }
        }

        info!(node = %node_name, "node drained");
        (results, Ok(()))
    }
}

/// Pods in groups that are never reached must stay distinguishable from
/// pods whose eviction timed out.
fn seed_results(groups: &[EvictionGroup]) -> EvictionResults {
    let mut results = EvictionResults::new();
    for group in groups {
        for pod in &group.full_pods {
            results.insert(
                ObjectRef::from_obj(pod),
                EvictionResult {
                    timed_out: false,
                    error: Some(PodEvictionError::NotAttempted),
                },
            );
        }
    }

    results
}

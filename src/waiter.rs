use k8s_openapi::api::core::v1::Pod;
use kube::runtime::reflector::ObjectRef;
use tokio::time::{Duration, Instant, sleep};
use tracing::{debug, warn};

use crate::cluster_api::is_not_found_error;
use crate::drainer::DrainContext;
use crate::results::{DrainError, EvictionResult, EvictionResults, PodEvictionError};

const DISAPPEARANCE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Blocks until every given pod has left the node, or the group's grace
/// window plus headroom has elapsed.
///
/// An accepted eviction only confirms that a termination started. Polling
/// for actual disappearance is what enforces the grace contract between
/// priority bands: the next band must not start while this one still has
/// pods on the node.
pub(crate) async fn wait_pods_gone(
    ctx: &DrainContext,
    node_name: &str,
    pods: &[Pod],
    grace_seconds: i64,
    results: &mut EvictionResults,
) -> Result<(), DrainError> {
    let deadline = Instant::now()
        + Duration::from_secs(grace_seconds.max(0) as u64)
        + ctx.config.pod_eviction_headroom;

    loop {
        let mut all_gone = true;
        for pod in pods {
            match is_pod_gone(ctx, node_name, pod).await {
                Ok(true) => {}
                // a transport error counts as not-yet-gone until the next tick
                Ok(false) | Err(_) => {
                    all_gone = false;
                    break;
                }
            }
        }

        if all_gone {
            debug!(node = %node_name, "all pods left the node");
            return Ok(());
        }

        if Instant::now() >= deadline || ctx.shutdown.is_triggered() {
            break;
        }

        tokio::select! {
            _ = sleep(DISAPPEARANCE_POLL_INTERVAL) => {}
            _ = ctx.shutdown.wait_triggered() => {}
        }
    }

    // Record what actually happened to each pod before reporting the group
    // as timed out: late disappearances still count as successes.
    for pod in pods {
        let result = match ctx.cluster_api.get_pod(pod).await {
            Ok(current) if is_bound_to(&current, node_name) => EvictionResult {
                timed_out: true,
                error: None,
            },
            Ok(_) => EvictionResult::succeeded(),
            Err(err) if is_not_found_error(&err) => EvictionResult::succeeded(),
            Err(err) => EvictionResult {
                timed_out: true,
                error: Some(PodEvictionError::DisappearanceCheckFailed { source: err }),
            },
        };
        results.insert(ObjectRef::from_obj(pod), result);
    }

    warn!(node = %node_name, "pods remaining after drain timeout");
    Err(DrainError::PodsRemaining {
        node: node_name.to_owned(),
    })
}

async fn is_pod_gone(ctx: &DrainContext, node_name: &str, pod: &Pod) -> kube::Result<bool> {
    match ctx.cluster_api.get_pod(pod).await {
        // a pod rebound to another node is no longer our concern
        Ok(current) => Ok(!is_bound_to(&current, node_name)),
        Err(err) if is_not_found_error(&err) => Ok(true),
        Err(err) => Err(err),
    }
}

fn is_bound_to(pod: &Pod, node_name: &str) -> bool {
    pod.spec.as_ref().and_then(|spec| spec.node_name.as_deref()) == Some(node_name)
}

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;

pub const MIRROR_POD_ANNOTATION_KEY: &str = "kubernetes.io/config.mirror";
pub const PLACEHOLDER_POD_ANNOTATION_KEY: &str = "k8s.io/cluster-autoscaler/fake-pod";
pub const DS_EVICTION_ANNOTATION_KEY: &str =
    "cluster-autoscaler.kubernetes.io/enable-ds-eviction";

pub const DEFAULT_TERMINATION_GRACE_SECONDS: i64 = 30;

/// Static pods are managed by the kubelet and cannot be evicted through the API.
pub fn is_mirror_pod(pod: &Pod) -> bool {
    pod.annotations().contains_key(MIRROR_POD_ANNOTATION_KEY)
}

/// Placeholder pods are synthetic markers injected by the surrounding
/// scale-down machinery. They have no real workload behind them.
pub fn is_placeholder_pod(pod: &Pod) -> bool {
    pod.annotations().contains_key(PLACEHOLDER_POD_ANNOTATION_KEY)
}

pub fn is_daemon_set_pod(pod: &Pod) -> bool {
    pod.owner_references()
        .iter()
        .any(|reference| reference.controller == Some(true) && reference.kind == "DaemonSet")
}

pub fn get_pod_priority(pod: &Pod) -> i32 {
    pod.spec.as_ref().and_then(|spec| spec.priority).unwrap_or(0)
}

pub fn get_pod_termination_grace_seconds(pod: &Pod) -> i64 {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.termination_grace_period_seconds)
        .unwrap_or(DEFAULT_TERMINATION_GRACE_SECONDS)
}

fn get_ds_eviction_override(pod: &Pod) -> Option<bool> {
    match pod.annotations().get(DS_EVICTION_ANNOTATION_KEY) {
        Some(value) if value == "true" => Some(true),
        Some(value) if value == "false" => Some(false),
        // unrecognized values fall back to the configured default
        _ => None,
    }
}

/// Partitions a node's resident pods for eviction.
///
/// Mirror pods and placeholder pods are dropped entirely. Daemon-set pods go
/// through the opt-in policy: with `evict_ds_by_default` they are evicted
/// unless annotated `"false"`, otherwise only when annotated `"true"`.
/// Everything else is a tenant pod and is always evicted.
pub fn pods_to_evict(pods: &[Pod], evict_ds_by_default: bool) -> (Vec<Pod>, Vec<Pod>) {
    let mut ds_pods = Vec::new();
    let mut tenant_pods = Vec::new();

    for pod in pods {
        if is_mirror_pod(pod) || is_placeholder_pod(pod) {
            continue;
        }

        if is_daemon_set_pod(pod) {
            if get_ds_eviction_override(pod).unwrap_or(evict_ds_by_default) {
                ds_pods.push(pod.clone());
            }
        } else {
            tenant_pods.push(pod.clone());
        }
    }

    (ds_pods, tenant_pods)
}

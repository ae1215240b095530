use k8s_openapi::api::core::v1::Pod;

use crate::pod_classification::get_pod_priority;

/// One entry of the shutdown-grace table: pods with priority up to
/// `priority_ceiling` get at most `shutdown_grace_seconds` to terminate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GracePeriodRule {
    pub priority_ceiling: i32,
    pub shutdown_grace_seconds: i64,
}

#[derive(Debug, Default)]
pub struct EvictionGroup {
    pub priority_ceiling: i32,
    pub grace_seconds: i64,
    pub full_pods: Vec<Pod>,
    pub best_effort_pods: Vec<Pod>,
}

impl EvictionGroup {
    pub fn is_empty(&self) -> bool {
        self.full_pods.is_empty() && self.best_effort_pods.is_empty()
    }
}

/// Buckets pods into eviction groups ordered by ascending priority ceiling.
///
/// A pod lands in the first band whose ceiling covers its priority; pods
/// above the largest ceiling share the last band and its grace. An empty
/// table collapses to a single band with grace 0, which means "no band cap".
/// With `full_ds_eviction`, daemon-set pods are promoted to full evictions.
/// Pods keep their input order within a band; bands without pods are kept so
/// the table shape stays visible to the caller.
pub fn group_pods_by_priority(
    rules: &[GracePeriodRule],
    full_pods: Vec<Pod>,
    best_effort_pods: Vec<Pod>,
    full_ds_eviction: bool,
) -> Vec<EvictionGroup> {
    let mut rules = rules.to_vec();
    rules.sort_by_key(|rule| rule.priority_ceiling);
    if rules.is_empty() {
        rules.push(GracePeriodRule {
            priority_ceiling: i32::MAX,
            shutdown_grace_seconds: 0,
        });
    }

    let mut groups: Vec<EvictionGroup> = rules
        .iter()
        .map(|rule| EvictionGroup {
            priority_ceiling: rule.priority_ceiling,
            grace_seconds: rule.shutdown_grace_seconds,
            ..EvictionGroup::default()
        })
        .collect();

    let (full_pods, best_effort_pods) = if full_ds_eviction {
        let mut merged = full_pods;
        merged.extend(best_effort_pods);
        (merged, Vec::new())
    } else {
        (full_pods, best_effort_pods)
    };

    for pod in full_pods {
        let index = group_index(&groups, get_pod_priority(&pod));
        groups[index].full_pods.push(pod);
    }
    for pod in best_effort_pods {
        let index = group_index(&groups, get_pod_priority(&pod));
        groups[index].best_effort_pods.push(pod);
    }

    groups
}

fn group_index(groups: &[EvictionGroup], priority: i32) -> usize {
    groups
        .iter()
        .position(|group| priority <= group.priority_ceiling)
        .unwrap_or(groups.len() - 1)
}

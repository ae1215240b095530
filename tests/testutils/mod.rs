use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use kube::error::ErrorResponse;
use kube::runtime::events::EventType;
use tokio::time::{Duration, Instant};

use scaledown_drain::{
    ClusterApi, Config, EventRecorder, EvictionObserver, EvictionOutcome, MetricsSink, NodeInfo,
};

#[macro_export]
macro_rules! from_json {
    ($($json:tt)+) => {
        ::serde_json::from_value(::serde_json::json!($($json)+)).expect("Invalid json")
    };
}

pub fn test_config(args: &[&str]) -> Config {
    use clap::Parser;

    let mut argv = vec!["scaledown-drain"];
    argv.extend_from_slice(args);
    Config::try_parse_from(argv).expect("invalid test config")
}

pub fn node_info(name: &str, pods: Vec<Pod>) -> NodeInfo {
    let node: Node = from_json!({
        "metadata": { "name": name },
    });

    NodeInfo { node, pods }
}

pub fn tenant_pod(name: &str, node: &str, priority: i32) -> Pod {
    from_json!({
        "metadata": {
            "name": name,
            "namespace": "default",
        },
        "spec": {
            "nodeName": node,
            "priority": priority,
        },
    })
}

pub fn tenant_pod_with_grace(name: &str, node: &str, priority: i32, grace_seconds: i64) -> Pod {
    from_json!({
        "metadata": {
            "name": name,
            "namespace": "default",
        },
        "spec": {
            "nodeName": node,
            "priority": priority,
            "terminationGracePeriodSeconds": grace_seconds,
        },
    })
}

pub fn daemon_set_pod(name: &str, node: &str) -> Pod {
    from_json!({
        "metadata": {
            "name": name,
            "namespace": "default",
            "ownerReferences": [{
                "apiVersion": "apps/v1",
                "kind": "DaemonSet",
                "name": "ds",
                "uid": "uid-ds",
                "controller": true,
            }],
        },
        "spec": {
            "nodeName": node,
        },
    })
}

pub fn mirror_pod(name: &str, node: &str) -> Pod {
    from_json!({
        "metadata": {
            "name": name,
            "namespace": "default",
            "annotations": { "kubernetes.io/config.mirror": "hash" },
        },
        "spec": {
            "nodeName": node,
        },
    })
}

pub fn placeholder_pod(name: &str, node: &str) -> Pod {
    from_json!({
        "metadata": {
            "name": name,
            "namespace": "default",
            "annotations": { "k8s.io/cluster-autoscaler/fake-pod": "true" },
        },
        "spec": {
            "nodeName": node,
        },
    })
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiCall {
    Evict {
        pod: String,
        grace_seconds: i64,
        at: Duration,
    },
    Delete {
        pod: String,
        at: Duration,
    },
    Get {
        pod: String,
        at: Duration,
    },
}

#[derive(Clone, Copy, Debug)]
pub enum EvictBehavior {
    /// The first `n` attempts fail with the given API code, later ones succeed.
    FailTimes(usize, u16),
    AlwaysFail(u16),
}

/// Scripted in-memory stand-in for the API server.
///
/// Records every call with a timestamp taken from the (paused) tokio clock,
/// so tests can assert on ordering between priority bands.
pub struct FakeClusterApi {
    node_name: String,
    started: Instant,
    calls: Mutex<Vec<ApiCall>>,
    evict_behavior: Mutex<HashMap<String, EvictBehavior>>,
    evict_attempts: Mutex<HashMap<String, usize>>,
    /// Pods that never leave the node, no matter what.
    stuck: Mutex<Vec<String>>,
    /// Pods that show up bound to a different node when fetched.
    rescheduled: Mutex<Vec<String>>,
    failing_deletes: Mutex<Vec<String>>,
    evicted: Mutex<Vec<String>>,
}

impl FakeClusterApi {
    pub fn new(node_name: &str) -> Self {
        Self {
            node_name: node_name.to_owned(),
            started: Instant::now(),
            calls: Mutex::new(Vec::new()),
            evict_behavior: Mutex::new(HashMap::new()),
            evict_attempts: Mutex::new(HashMap::new()),
            stuck: Mutex::new(Vec::new()),
            rescheduled: Mutex::new(Vec::new()),
            failing_deletes: Mutex::new(Vec::new()),
            evicted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_evict_behavior(self, pod: &str, behavior: EvictBehavior) -> Self {
        self.evict_behavior
            .lock()
            .unwrap()
            .insert(pod.to_owned(), behavior);
        self
    }

    pub fn with_stuck_pod(self, pod: &str) -> Self {
        self.stuck.lock().unwrap().push(pod.to_owned());
        self
    }

    pub fn with_rescheduled_pod(self, pod: &str) -> Self {
        self.rescheduled.lock().unwrap().push(pod.to_owned());
        self
    }

    pub fn with_failing_delete(self, pod: &str) -> Self {
        self.failing_deletes.lock().unwrap().push(pod.to_owned());
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn evict_times(&self, pod: &str) -> Vec<Duration> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Evict { pod: name, at, .. } if name == pod => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn evict_count(&self, pod: &str) -> usize {
        self.evict_times(pod).len()
    }

    pub fn evict_grace(&self, pod: &str) -> Option<i64> {
        self.calls().into_iter().find_map(|call| match call {
            ApiCall::Evict {
                pod: name,
                grace_seconds,
                ..
            } if name == pod => Some(grace_seconds),
            _ => None,
        })
    }

    pub fn delete_count(&self, pod: &str) -> usize {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, ApiCall::Delete { pod: name, .. } if name == pod))
            .count()
    }

    pub fn get_count(&self) -> usize {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, ApiCall::Get { .. }))
            .count()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn api_error(code: u16, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_owned(),
            message: message.to_owned(),
            reason: String::new(),
            code,
        })
    }

    fn is_listed(list: &Mutex<Vec<String>>, pod: &str) -> bool {
        list.lock().unwrap().iter().any(|name| name == pod)
    }
}

#[async_trait]
impl ClusterApi for FakeClusterApi {
    async fn evict_pod(&self, pod: &Pod, grace_period_seconds: i64) -> kube::Result<()> {
        let name = pod.name_any();
        self.record(ApiCall::Evict {
            pod: name.clone(),
            grace_seconds: grace_period_seconds,
            at: self.elapsed(),
        });

        let attempt = {
            let mut attempts = self.evict_attempts.lock().unwrap();
            let attempt = attempts.entry(name.clone()).or_insert(0);
            *attempt += 1;
            *attempt
        };

        let behavior = self.evict_behavior.lock().unwrap().get(&name).copied();
        match behavior {
            Some(EvictBehavior::FailTimes(n, code)) if attempt <= n => {
                Err(Self::api_error(code, "eviction rejected"))
            }
            Some(EvictBehavior::AlwaysFail(code)) => {
                Err(Self::api_error(code, "eviction rejected"))
            }
            _ => {
                self.evicted.lock().unwrap().push(name);
                Ok(())
            }
        }
    }

    async fn delete_pod(&self, pod: &Pod) -> kube::Result<()> {
        let name = pod.name_any();
        self.record(ApiCall::Delete {
            pod: name.clone(),
            at: self.elapsed(),
        });

        if Self::is_listed(&self.failing_deletes, &name) {
            return Err(Self::api_error(500, "delete rejected"));
        }

        self.evicted.lock().unwrap().push(name);
        Ok(())
    }

    async fn get_pod(&self, pod: &Pod) -> kube::Result<Pod> {
        let name = pod.name_any();
        self.record(ApiCall::Get {
            pod: name.clone(),
            at: self.elapsed(),
        });

        if Self::is_listed(&self.rescheduled, &name) {
            let mut rescheduled = pod.clone();
            if let Some(spec) = rescheduled.spec.as_mut() {
                spec.node_name = Some(format!("not-{}", self.node_name));
            }
            return Ok(rescheduled);
        }

        if Self::is_listed(&self.stuck, &name) {
            return Ok(pod.clone());
        }

        if Self::is_listed(&self.evicted, &name) {
            return Err(Self::api_error(404, "pod not found"));
        }

        Ok(pod.clone())
    }
}

#[derive(Clone, Debug)]
pub struct RecordedEvent {
    pub pod: String,
    pub reason: String,
    pub note: String,
    pub warning: bool,
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn warning_count_for(&self, pod: &str) -> usize {
        self.events()
            .into_iter()
            .filter(|event| event.warning && event.pod == pod)
            .count()
    }
}

#[async_trait]
impl EventRecorder for RecordingEvents {
    async fn publish(&self, pod: &Pod, type_: EventType, reason: &str, note: String) {
        self.events.lock().unwrap().push(RecordedEvent {
            pod: pod.name_any(),
            reason: reason.to_owned(),
            note,
            warning: matches!(type_, EventType::Warning),
        });
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl RecordingMetrics {
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}

impl MetricsSink for RecordingMetrics {
    fn register_eviction(&self, count: u64, outcome: EvictionOutcome) {
        match outcome {
            EvictionOutcome::Succeeded => self.succeeded.fetch_add(count, Ordering::SeqCst),
            EvictionOutcome::Failed => self.failed.fetch_add(count, Ordering::SeqCst),
        };
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    evicted: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn evicted(&self) -> Vec<String> {
        self.evicted.lock().unwrap().clone()
    }
}

impl EvictionObserver for RecordingObserver {
    fn on_evicted(&self, pod: &Pod) {
        self.evicted.lock().unwrap().push(pod.name_any());
    }
}

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use kube::runtime::events::EventType;
use kube::runtime::reflector::ObjectRef;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cluster_api::is_not_found_error;
use crate::drainer::DrainContext;
use crate::events::{REASON_SCALE_DOWN, REASON_SCALE_DOWN_FAILED};
use crate::metrics::EvictionOutcome;
use crate::pod_classification::get_pod_termination_grace_seconds;
use crate::priority_groups::EvictionGroup;
use crate::results::{DrainError, EvictionResult, EvictionResults, PodEvictionError};

/// Callback notified once per successfully evicted pod, including pods
/// removed through the force-delete fallback.
pub trait EvictionObserver: Send + Sync {
    fn on_evicted(&self, pod: &Pod);
}

/// Dispatches one eviction task per pod in the group and blocks until every
/// task has reported back.
///
/// Full-eviction outcomes land in the result map and the eviction counter;
/// best-effort outcomes are awaited for completion but otherwise dropped.
/// Returns an error when any full eviction failed, so the caller stops
/// before touching higher-priority bands.
pub(crate) async fn initiate_group_evictions(
    ctx: &Arc<DrainContext>,
    node_name: &str,
    group: &EvictionGroup,
    force: bool,
    results: &mut EvictionResults,
) -> Result<(), DrainError> {
    let retry_until = Instant::now() + ctx.config.max_pod_eviction_time;

    // A worker that never reports back leaves its pod recorded as timed out,
    // not as "not attempted".
    for pod in &group.full_pods {
        results.insert(
            ObjectRef::from_obj(pod),
            EvictionResult {
                timed_out: true,
                error: None,
            },
        );
    }

    // Sized to the pod counts so no task ever blocks on publishing.
    let (full_tx, mut full_rx) = mpsc::channel(group.full_pods.len().max(1));
    let (best_effort_tx, mut best_effort_rx) = mpsc::channel(group.best_effort_pods.len().max(1));

    for pod in &group.full_pods {
        let task = EvictionTask {
            ctx: Arc::clone(ctx),
            pod: pod.clone(),
            band_grace_seconds: group.grace_seconds,
            retry_until,
            full_eviction: true,
            force,
        };
        let tx = full_tx.clone();
        let span = info_span!("evict", pod = %pod_id(pod));
        tokio::spawn(
            async move {
                let outcome = task.run().await;
                _ = tx.send((ObjectRef::from_obj(&task.pod), outcome)).await;
            }
            .instrument(span),
        );
    }
    for pod in &group.best_effort_pods {
        let task = EvictionTask {
            ctx: Arc::clone(ctx),
            pod: pod.clone(),
            band_grace_seconds: group.grace_seconds,
            retry_until,
            full_eviction: false,
            force: false,
        };
        let tx = best_effort_tx.clone();
        let span = info_span!("evict", pod = %pod_id(pod), best_effort = true);
        tokio::spawn(
            async move {
                let outcome = task.run().await;
                _ = tx.send(outcome).await;
            }
            .instrument(span),
        );
    }
    drop(full_tx);
    drop(best_effort_tx);

    let total = group.full_pods.len() + group.best_effort_pods.len();
    for _ in 0..total {
        tokio::select! {
            Some((pod_ref, outcome)) = full_rx.recv() => {
                let counted = if outcome.is_success() {
                    EvictionOutcome::Succeeded
                } else {
                    EvictionOutcome::Failed
                };
                ctx.metrics.register_eviction(1, counted);
                results.insert(pod_ref, outcome);
            }
            Some(_) = best_effort_rx.recv() => {
                // best-effort outcomes are not surfaced to callers
            }
        }
    }

    let failures: Vec<String> = group
        .full_pods
        .iter()
        .filter_map(|pod| {
            let result = results.get(&ObjectRef::from_obj(pod))?;
            let error = result.error.as_ref()?;
            Some(format!("{}: {error}", pod_id(pod)))
        })
        .collect();

    if !failures.is_empty() {
        return Err(DrainError::EvictionsFailed {
            node: node_name.to_owned(),
            failures,
        });
    }

    Ok(())
}

struct EvictionTask {
    ctx: Arc<DrainContext>,
    pod: Pod,
    band_grace_seconds: i64,
    retry_until: Instant,
    full_eviction: bool,
    force: bool,
}

impl EvictionTask {
    async fn run(&self) -> EvictionResult {
        let ctx = &self.ctx;

        ctx.events
            .publish(
                &self.pod,
                EventType::Normal,
                REASON_SCALE_DOWN,
                "deleting pod for node scale down".to_owned(),
            )
            .await;

        let termination_grace =
            effective_termination_grace(&self.pod, self.band_grace_seconds);

        let mut last_error = None;
        let cancelled = loop {
            let attempt = tokio::select! {
                result = ctx.cluster_api.evict_pod(&self.pod, termination_grace) => result,
                _ = ctx.shutdown.wait_triggered() => break true,
            };

            match attempt {
                Ok(()) => return self.evicted(),
                Err(err) if is_not_found_error(&err) => {
                    debug!("pod is gone anyway"); // This is what we desired.
                    return self.evicted();
                }
                Err(err) => {
                    debug!(%err, "eviction attempt failed");
                    last_error = Some(err);
                }
            }

            if Instant::now() >= self.retry_until {
                break false;
            }

            tokio::select! {
                _ = sleep(ctx.config.eviction_retry_interval) => {}
                _ = ctx.shutdown.wait_triggered() => break true,
            }
        };

        if cancelled {
            return EvictionResult {
                timed_out: true,
                error: Some(PodEvictionError::EvictionTimeout { last_error }),
            };
        }

        if self.force && self.full_eviction {
            let deleted = tokio::select! {
                result = ctx.cluster_api.delete_pod(&self.pod) => result,
                _ = ctx.shutdown.wait_triggered() => {
                    return EvictionResult {
                        timed_out: true,
                        error: Some(PodEvictionError::EvictionTimeout { last_error }),
                    };
                }
            };

            match deleted {
                Ok(()) => return self.evicted(),
                Err(err) if is_not_found_error(&err) => return self.evicted(),
                Err(err) => {
                    warn!(%err, "failed to force delete pod");
                    ctx.events
                        .publish(
                            &self.pod,
                            EventType::Warning,
                            REASON_SCALE_DOWN_FAILED,
                            format!("failed to force delete pod: {err}"),
                        )
                        .await;
                    return EvictionResult {
                        timed_out: false,
                        error: Some(PodEvictionError::ForceDeleteFailed { source: err }),
                    };
                }
            }
        }

        if self.full_eviction {
            warn!("failed to evict pod within allowed timeout");
            ctx.events
                .publish(
                    &self.pod,
                    EventType::Warning,
                    REASON_SCALE_DOWN_FAILED,
                    "failed to delete pod for node scale down".to_owned(),
                )
                .await;
        }

        EvictionResult {
            timed_out: true,
            error: Some(PodEvictionError::EvictionTimeout { last_error }),
        }
    }

    fn evicted(&self) -> EvictionResult {
        info!("pod evicted");
        if let Some(observer) = &self.ctx.observer {
            observer.on_evicted(&self.pod);
        }

        EvictionResult::succeeded()
    }
}

/// The pod's own grace applies unless the band caps it; a band grace of 0
/// puts no cap at all.
fn effective_termination_grace(pod: &Pod, band_grace_seconds: i64) -> i64 {
    let pod_grace = get_pod_termination_grace_seconds(pod);
    if band_grace_seconds > 0 && pod_grace > band_grace_seconds {
        band_grace_seconds
    } else {
        pod_grace
    }
}

fn pod_id(pod: &Pod) -> String {
    match pod.namespace() {
        Some(ns) => format!("{ns}/{}", pod.name_any()),
        None => pod.name_any(),
    }
}

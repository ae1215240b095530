use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Meter};
use strum_macros::Display;

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum EvictionOutcome {
    Succeeded,
    Failed,
}

/// Counter sink for full-eviction outcomes.
pub trait MetricsSink: Send + Sync {
    fn register_eviction(&self, count: u64, outcome: EvictionOutcome);
}

pub struct EvictionMetrics {
    evictions: Counter<u64>,
}

impl EvictionMetrics {
    pub fn new(meter: &Meter) -> Self {
        let evictions = meter
            .u64_counter("scaledown_evictions_total")
            .with_description("Pod evictions performed while draining nodes for scale-down")
            .init();

        Self { evictions }
    }
}

impl MetricsSink for EvictionMetrics {
    fn register_eviction(&self, count: u64, outcome: EvictionOutcome) {
        self.evictions
            .add(count, &[KeyValue::new("outcome", outcome.to_string())]);
    }
}

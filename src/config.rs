use std::time::Duration;

use clap::{ArgAction, Parser};
use eyre::{Result, eyre};
use humantime::parse_duration;

use crate::priority_groups::GracePeriodRule;

#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct Config {
    /// Gap between retries of a single pod's eviction request.
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    pub eviction_retry_interval: Duration,

    /// Total retry window for a single pod's eviction requests.
    #[arg(long, default_value = "2m", value_parser = parse_duration)]
    pub max_pod_eviction_time: Duration,

    /// Extra time after a group's shutdown grace before remaining pods are
    /// declared stuck.
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    pub pod_eviction_headroom: Duration,

    /// Shutdown grace per priority band as `priority:grace-seconds` pairs,
    /// e.g. `1000:60,10000:120`.
    #[arg(long, value_delimiter = ',', value_parser = parse_grace_rule)]
    pub shutdown_grace_by_priority: Vec<GracePeriodRule>,

    /// Treat daemon-set pods as full evictions instead of best-effort ones.
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub full_ds_eviction: bool,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub evict_ds_for_occupied_nodes: bool,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub evict_ds_for_empty_nodes: bool,
}

fn parse_grace_rule(input: &str) -> Result<GracePeriodRule> {
    let Some((priority, grace)) = input.split_once(':') else {
        return Err(eyre!(
            "expected 'priority:grace-seconds', got '{input}'"
        ));
    };

    Ok(GracePeriodRule {
        priority_ceiling: priority.trim().parse()?,
        shutdown_grace_seconds: grace.trim().parse()?,
    })
}

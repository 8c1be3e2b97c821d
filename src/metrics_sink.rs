//! Gauge emission (spec §6). Metric names and label sets are a fixed
//! contract — this is the only module that calls into the `metrics` facade,
//! so a renamed or relabelled gauge has exactly one call site to change.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::jobs::JobAggregates;
use crate::storage::StorageSample;

pub fn emit_storage(samples: &[StorageSample]) {
    for sample in samples {
        metrics::gauge!(
            "nbu_storage_bytes",
            "name" => sample.name.clone(),
            "type" => sample.server_type.clone(),
            "size" => sample.dimension.as_label(),
        )
        .set(sample.bytes);
    }
}

pub fn emit_jobs(aggregates: &JobAggregates) {
    for (key, count) in &aggregates.counts {
        metrics::gauge!(
            "nbu_jobs_count",
            "action" => key.action.clone(),
            "policy_type" => key.policy_type.clone(),
            "status" => key.status.clone(),
        )
        .set(*count);
    }
    for (key, bytes) in &aggregates.bytes {
        metrics::gauge!(
            "nbu_jobs_size_bytes",
            "action" => key.action.clone(),
            "policy_type" => key.policy_type.clone(),
            "status" => key.status.clone(),
        )
        .set(*bytes);
    }
    for (key, count) in &aggregates.status_counts {
        metrics::gauge!(
            "nbu_jobs_status_count",
            "action" => key.action.clone(),
            "status" => key.status.clone(),
        )
        .set(*count);
    }
}

pub fn emit_api_version(version: &str) {
    metrics::gauge!("nbu_api_version", "version" => version.to_string()).set(1.0);
}

pub fn emit_up(up: bool) {
    metrics::gauge!("nbu_up").set(if up { 1.0 } else { 0.0 });
}

pub fn emit_last_scrape_timestamp(source: &'static str, captured_at: SystemTime) {
    let seconds = captured_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    metrics::gauge!("nbu_last_scrape_timestamp_seconds", "source" => source).set(seconds);
}

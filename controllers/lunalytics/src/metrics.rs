//! # Metrics
//!
//! Prometheus metrics exposed on `/metrics`.
//!
//! - `lunalytics_operator_reconciliations_total` - reconciliations by resource kind, event and outcome
//! - `lunalytics_operator_reconciliation_duration_seconds` - reconciliation latency by resource kind
//! - `lunalytics_operator_api_calls_total` - Lunalytics API calls by operation and result
//! - `lunalytics_operator_api_retries_total` - retried Lunalytics API attempts by operation
//! - `lunalytics_operator_watch_events_total` - watch events delivered or dropped by the change filter

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;
use std::time::Duration;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lunalytics_operator_reconciliations_total",
            "Total number of reconciliations by resource kind, event and outcome",
        ),
        &["resource", "event", "outcome"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "lunalytics_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 30.0, 120.0]),
        &["resource"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static API_CALLS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lunalytics_operator_api_calls_total",
            "Total number of Lunalytics API calls by operation and result",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create API_CALLS_TOTAL metric - this should never happen")
});

static API_RETRIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lunalytics_operator_api_retries_total",
            "Total number of retried Lunalytics API attempts by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create API_RETRIES_TOTAL metric - this should never happen")
});

static WATCH_EVENTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lunalytics_operator_watch_events_total",
            "Total number of watch events by resource kind and disposition",
        ),
        &["resource", "disposition"],
    )
    .expect("Failed to create WATCH_EVENTS_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(API_CALLS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(API_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_EVENTS_TOTAL.clone()))?;
    Ok(())
}

pub fn observe_reconciliation(resource: &str, event: &str, outcome: &str, elapsed: Duration) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[resource, event, outcome])
        .inc();
    RECONCILIATION_DURATION
        .with_label_values(&[resource])
        .observe(elapsed.as_secs_f64());
}

pub fn increment_api_calls(operation: &str, result: &str) {
    API_CALLS_TOTAL.with_label_values(&[operation, result]).inc();
}

pub fn increment_api_retries(operation: &str) {
    API_RETRIES_TOTAL.with_label_values(&[operation]).inc();
}

/// `disposition` is "dispatched" or "unchanged".
pub fn increment_watch_events(resource: &str, disposition: &str) {
    WATCH_EVENTS_TOTAL
        .with_label_values(&[resource, disposition])
        .inc();
}

//! `lunalytics.io/*` annotation contract for Ingress and Service resources.

use crate::desired::PartialMonitorSpec;
use std::collections::BTreeMap;
use tracing::warn;

/// Common prefix of every operator annotation.
pub const ANNOTATION_PREFIX: &str = "lunalytics.io/";

pub const ENABLED: &str = "lunalytics.io/enabled";
pub const NAME: &str = "lunalytics.io/name";
pub const URL: &str = "lunalytics.io/url";
pub const INTERVAL: &str = "lunalytics.io/interval";
pub const RETRY_INTERVAL: &str = "lunalytics.io/retry-interval";
pub const REQUEST_TIMEOUT: &str = "lunalytics.io/request-timeout";
pub const METHOD: &str = "lunalytics.io/method";
pub const VALID_STATUS_CODES: &str = "lunalytics.io/valid-status-codes";
/// Written by the operator; holds the bound Lunalytics monitor id.
pub const MONITOR_ID: &str = "lunalytics.io/monitor-id";

/// Monitoring is on only when `lunalytics.io/enabled` is "true" (any case).
pub fn is_monitoring_enabled(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(ENABLED)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Stored monitor id, if the resource has been bound.
pub fn monitor_id(annotations: &BTreeMap<String, String>) -> Option<&str> {
    annotations
        .get(MONITOR_ID)
        .map(String::as_str)
        .filter(|id| !id.is_empty())
}

fn non_empty<'a>(annotations: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    annotations
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn seconds(annotations: &BTreeMap<String, String>, key: &str) -> Option<i64> {
    let raw = non_empty(annotations, key)?;
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring annotation {}: {:?} is not an integer", key, raw);
            None
        }
    }
}

/// Reads the monitor fields a resource declares through annotations.
///
/// Integers that do not parse are dropped with a warning so defaults apply.
/// The method is upper-cased and status codes are split on commas.
pub fn extract(annotations: &BTreeMap<String, String>) -> PartialMonitorSpec {
    PartialMonitorSpec {
        name: non_empty(annotations, NAME).map(str::to_string),
        url: non_empty(annotations, URL).map(str::to_string),
        monitor_type: None,
        method: non_empty(annotations, METHOD).map(str::to_uppercase),
        interval: seconds(annotations, INTERVAL),
        retry_interval: seconds(annotations, RETRY_INTERVAL),
        request_timeout: seconds(annotations, REQUEST_TIMEOUT),
        valid_status_codes: non_empty(annotations, VALID_STATUS_CODES).map(|codes| {
            codes
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        }),
    }
}

/// Annotations that feed the desired spec, excluding the operator-written id.
pub fn declared(annotations: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    annotations
        .iter()
        .filter(|(k, _)| k.starts_with(ANNOTATION_PREFIX) && k.as_str() != MONITOR_ID)
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

//! Monitor CRD
//!
//! Declares a Lunalytics monitor directly, without annotating an Ingress or Service.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "lunalytics.io",
    version = "v1alpha1",
    kind = "Monitor",
    plural = "monitors",
    namespaced,
    status = "MonitorStatus",
    shortname = "lmon",
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".spec.url"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Uptime","type":"number","jsonPath":".status.uptimePercentage"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSpec {
    /// Display name in Lunalytics (defaults to `Monitor/<name>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// URL to probe; must start with http:// or https://
    pub url: String,

    /// Monitor type: http, https, tcp or udp
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub monitor_type: Option<String>,

    /// HTTP method used by the probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Seconds between checks (1-86400)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 86400))]
    pub interval: Option<u32>,

    /// Seconds between checks while the target is down (1-86400)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 86400))]
    pub retry_interval: Option<u32>,

    /// Probe timeout in seconds (1-300)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 300))]
    pub request_timeout: Option<u32>,

    /// Accepted status codes, e.g. "200" or "200-299"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_status_codes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    /// Synchronisation state
    pub state: MonitorState,

    /// Human readable detail for the current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Lunalytics monitor id bound to this resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_id: Option<String>,

    /// Uptime reported by Lunalytics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_percentage: Option<f64>,

    /// Average heartbeat latency in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_latency: Option<f64>,

    /// Last time the operator wrote this status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Monitor synchronisation state
///
/// Serializes lowercase ("active", "error", "conflict") to match what
/// `kubectl get monitors` users filter on.
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    /// Not reconciled yet
    #[default]
    #[serde(alias = "Pending")]
    Pending,

    /// Monitor exists in Lunalytics and matches the spec
    #[serde(alias = "Active")]
    Active,

    /// Validation or Lunalytics failure
    #[serde(alias = "Error")]
    Error,

    /// Another resource declares the same URL and takes precedence
    #[serde(alias = "Conflict")]
    Conflict,
}

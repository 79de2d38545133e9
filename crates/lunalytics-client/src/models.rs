//! Lunalytics API models
//!
//! Request bodies mirror the JSON the Lunalytics monitor endpoints accept.
//! Responses are parsed leniently: every field the operator does not rely on
//! falls back to its default so that additive API changes do not break decoding.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `POST /api/monitor/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorCreate {
    /// Display name
    pub name: String,
    /// Checked URL
    pub url: String,
    /// Check type (`http`, `https`, `tcp`, `udp`)
    #[serde(rename = "type")]
    pub monitor_type: String,
    /// HTTP method
    pub method: String,
    /// Accepted status codes (`DDD` or `DDD-DDD`)
    pub valid_status_codes: Vec<String>,
    /// Seconds between checks
    pub interval: u32,
    /// Seconds between checks while down
    pub retry_interval: u32,
    /// Request timeout in seconds
    pub request_timeout: u32,
}

/// Body of `POST /api/monitor/edit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorUpdate {
    /// Id of the monitor to edit
    #[serde(rename = "monitorId")]
    pub monitor_id: String,
    /// Replacement settings
    #[serde(flatten)]
    pub monitor: MonitorCreate,
}

/// A single heartbeat sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    /// Sample id
    #[serde(default)]
    pub id: i64,
    /// HTTP status observed
    #[serde(default)]
    pub status: i64,
    /// Latency in milliseconds
    #[serde(default)]
    pub latency: i64,
    /// Sample time in epoch milliseconds
    #[serde(default)]
    pub date: i64,
    /// The check failed
    #[serde(default)]
    pub is_down: bool,
    /// Backend message
    #[serde(default)]
    pub message: String,
}

/// TLS certificate details reported for https monitors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Certificate chain validated
    #[serde(default)]
    pub is_valid: bool,
    /// Issuer fields
    #[serde(default)]
    pub issuer: HashMap<String, String>,
    /// Start of the validity window
    #[serde(default)]
    pub valid_from: String,
    /// End of the validity window
    #[serde(default)]
    pub valid_till: String,
    /// Names the certificate covers
    #[serde(default)]
    pub valid_on: Vec<String>,
    /// Days until expiry (number or string)
    #[serde(default)]
    pub days_remaining: serde_json::Value,
    /// Next certificate check in epoch milliseconds
    #[serde(default)]
    pub next_check: i64,
}

/// Monitor record returned by add, edit and get.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MonitorResponse {
    /// Lunalytics monitor id
    pub monitor_id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Checked URL
    #[serde(default)]
    pub url: String,
    /// Seconds between checks
    #[serde(default)]
    pub interval: u32,
    /// Seconds between checks while down
    #[serde(default)]
    pub retry_interval: u32,
    /// Request timeout in seconds
    #[serde(default)]
    pub request_timeout: u32,
    /// HTTP method
    #[serde(default)]
    pub method: String,
    /// Request headers, free-form
    #[serde(default)]
    pub headers: serde_json::Value,
    /// Request body, free-form
    #[serde(default)]
    pub body: serde_json::Value,
    /// Accepted status codes
    #[serde(default, rename = "valid_status_codes")]
    pub valid_status_codes: Vec<String>,
    /// Owner email
    #[serde(default)]
    pub email: Option<String>,
    /// Check type
    #[serde(default, rename = "type")]
    pub monitor_type: String,
    /// Port for tcp and udp checks
    #[serde(default)]
    pub port: Option<u16>,
    /// Uptime over the retained window
    #[serde(default)]
    pub uptime_percentage: f64,
    /// Mean latency in milliseconds
    #[serde(default)]
    pub average_heartbeat_latency: f64,
    /// Dashboard filter toggle
    #[serde(default)]
    pub show_filters: bool,
    /// Checks are suspended
    #[serde(default)]
    pub paused: bool,
    /// Recent samples, newest first
    #[serde(default)]
    pub heartbeats: Vec<Heartbeat>,
    /// Certificate details for https checks
    #[serde(default)]
    pub cert: Option<Certificate>,
}

/// Observed statistics copied into resource status.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonitorStats {
    /// Uptime percentage
    pub uptime_percentage: f64,
    /// Mean heartbeat latency in milliseconds
    pub average_latency: f64,
}

impl From<&MonitorResponse> for MonitorStats {
    fn from(response: &MonitorResponse) -> Self {
        Self {
            uptime_percentage: response.uptime_percentage,
            average_latency: response.average_heartbeat_latency,
        }
    }
}

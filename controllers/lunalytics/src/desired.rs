//! Desired monitor state.
//!
//! A resource declares a [`PartialMonitorSpec`]; [`merge_defaults`] overlays it
//! on the configured [`MonitorDefaults`] and [`validate`] checks the result
//! before anything is sent to Lunalytics.

use std::sync::LazyLock;

use lunalytics_client::MonitorCreate;
use regex::Regex;

/// Monitor types Lunalytics accepts.
pub const VALID_TYPES: [&str; 4] = ["http", "https", "tcp", "udp"];

/// HTTP methods Lunalytics accepts.
pub const VALID_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

const MAX_NAME_LEN: usize = 255;
const MAX_INTERVAL_SECS: i64 = 86_400;
const MAX_REQUEST_TIMEOUT_SECS: i64 = 300;

static STATUS_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{3}(-\d{3})?$").expect("status code pattern compiles")
});

/// Fields a resource explicitly declared. Anything `None` is filled from defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialMonitorSpec {
    pub name: Option<String>,
    pub url: Option<String>,
    pub monitor_type: Option<String>,
    pub method: Option<String>,
    pub interval: Option<i64>,
    pub retry_interval: Option<i64>,
    pub request_timeout: Option<i64>,
    pub valid_status_codes: Option<Vec<String>>,
}

impl PartialMonitorSpec {
    /// Names the monitor `"{kind}/{resource}"` unless a name was declared.
    pub fn with_default_name(mut self, kind: &str, resource_name: &str) -> Self {
        if self.name.as_deref().is_none_or(str::is_empty) {
            self.name = Some(format!("{}/{}", kind, resource_name));
        }
        self
    }
}

/// Defaults applied to every monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDefaults {
    pub monitor_type: String,
    pub method: String,
    pub interval: i64,
    pub retry_interval: i64,
    pub request_timeout: i64,
    pub valid_status_codes: Vec<String>,
}

impl Default for MonitorDefaults {
    fn default() -> Self {
        Self {
            monitor_type: "http".to_string(),
            method: "GET".to_string(),
            interval: 30,
            retry_interval: 30,
            request_timeout: 30,
            valid_status_codes: vec!["200-299".to_string()],
        }
    }
}

/// Fully populated desired state of one monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDesiredSpec {
    pub name: String,
    pub url: String,
    pub monitor_type: String,
    pub method: String,
    pub interval: i64,
    pub retry_interval: i64,
    pub request_timeout: i64,
    pub valid_status_codes: Vec<String>,
}

/// Overlays `partial` on `defaults`; declared values win.
pub fn merge_defaults(partial: PartialMonitorSpec, defaults: &MonitorDefaults) -> MonitorDesiredSpec {
    MonitorDesiredSpec {
        name: partial.name.unwrap_or_default(),
        url: partial.url.unwrap_or_default(),
        monitor_type: partial.monitor_type.unwrap_or_else(|| defaults.monitor_type.clone()),
        method: partial.method.unwrap_or_else(|| defaults.method.clone()),
        interval: partial.interval.unwrap_or(defaults.interval),
        retry_interval: partial.retry_interval.unwrap_or(defaults.retry_interval),
        request_timeout: partial.request_timeout.unwrap_or(defaults.request_timeout),
        valid_status_codes: partial
            .valid_status_codes
            .unwrap_or_else(|| defaults.valid_status_codes.clone()),
    }
}

/// `DDD` or `DDD-DDD`.
pub fn is_valid_status_code(code: &str) -> bool {
    STATUS_CODE.is_match(code)
}

fn check_seconds(errors: &mut Vec<String>, field: &str, value: i64, max: i64) {
    if value < 1 {
        errors.push(format!("{} must be a positive integer", field));
    } else if value > max {
        errors.push(format!("{} must be at most {} seconds", field, max));
    }
}

/// Returns every problem with `spec`; an empty list means it can be sent.
pub fn validate(spec: &MonitorDesiredSpec) -> Vec<String> {
    let mut errors = Vec::new();

    if spec.url.is_empty() {
        errors.push("URL is required".to_string());
    } else if !(spec.url.starts_with("http://") || spec.url.starts_with("https://")) {
        errors.push(format!("URL must start with http:// or https://: {}", spec.url));
    }

    if spec.name.is_empty() {
        errors.push("Name is required".to_string());
    } else if spec.name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("Name must be at most {} characters", MAX_NAME_LEN));
    }

    if !VALID_TYPES.contains(&spec.monitor_type.as_str()) {
        errors.push(format!("type must be one of: {}", VALID_TYPES.join(", ")));
    }

    if !VALID_METHODS.contains(&spec.method.as_str()) {
        errors.push(format!("method must be one of: {}", VALID_METHODS.join(", ")));
    }

    check_seconds(&mut errors, "interval", spec.interval, MAX_INTERVAL_SECS);
    check_seconds(&mut errors, "retry_interval", spec.retry_interval, MAX_INTERVAL_SECS);
    check_seconds(&mut errors, "request_timeout", spec.request_timeout, MAX_REQUEST_TIMEOUT_SECS);

    for code in &spec.valid_status_codes {
        if !is_valid_status_code(code) {
            errors.push(format!("Invalid status code format: {}", code));
        }
    }

    errors
}

impl MonitorDesiredSpec {
    /// Validates and converts into the Lunalytics request body.
    pub fn to_payload(&self) -> Result<MonitorCreate, Vec<String>> {
        let errors = validate(self);
        if !errors.is_empty() {
            return Err(errors);
        }

        let seconds = |value: i64| u32::try_from(value).unwrap_or(u32::MAX);
        Ok(MonitorCreate {
            name: self.name.clone(),
            url: self.url.clone(),
            monitor_type: self.monitor_type.clone(),
            method: self.method.clone(),
            valid_status_codes: self.valid_status_codes.clone(),
            interval: seconds(self.interval),
            retry_interval: seconds(self.retry_interval),
            request_timeout: seconds(self.request_timeout),
        })
    }
}

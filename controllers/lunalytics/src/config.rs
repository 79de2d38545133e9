//! Operator configuration.
//!
//! Values are read once at startup from an optional YAML file
//! (`LUNALYTICS_CONFIG_FILE`, default `/app/config/defaults.yaml`) and then
//! overridden by environment variables. The result is a fully populated
//! [`OperatorConfig`]; nothing downstream deals with optional settings.

use crate::desired::MonitorDefaults;
use crate::error::ControllerError;
use crate::namespace_filter::NamespaceFilterPolicy;
use lunalytics_client::RetryPolicy;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "https://lunalytics.xyz";
pub const DEFAULT_CONFIG_FILE: &str = "/app/config/defaults.yaml";
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// How duplicate URL declarations are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateHandling {
    /// Annotated Ingress/Service outrank Monitor resources
    #[default]
    AnnotationPriority,
    /// No arbitration; every declaration gets its own monitor
    Disabled,
}

impl FromStr for DuplicateHandling {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annotation_priority" => Ok(DuplicateHandling::AnnotationPriority),
            "none" | "disabled" => Ok(DuplicateHandling::Disabled),
            other => Err(ControllerError::InvalidConfig(format!(
                "unknown duplicate handling {:?} (expected annotation_priority or none)",
                other
            ))),
        }
    }
}

/// Sparse overrides for [`MonitorDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorDefaultsOverride {
    #[serde(rename = "type")]
    pub monitor_type: Option<String>,
    pub method: Option<String>,
    pub interval: Option<i64>,
    pub retry_interval: Option<i64>,
    pub request_timeout: Option<i64>,
    pub valid_status_codes: Option<Vec<String>>,
}

impl MonitorDefaultsOverride {
    /// Layers `other` on top of `self`; fields set in `other` win.
    #[must_use]
    pub fn overlay(self, other: MonitorDefaultsOverride) -> Self {
        Self {
            monitor_type: other.monitor_type.or(self.monitor_type),
            method: other.method.or(self.method),
            interval: other.interval.or(self.interval),
            retry_interval: other.retry_interval.or(self.retry_interval),
            request_timeout: other.request_timeout.or(self.request_timeout),
            valid_status_codes: other.valid_status_codes.or(self.valid_status_codes),
        }
    }

    /// Applies the overrides to `base`.
    pub fn apply(&self, base: &MonitorDefaults) -> MonitorDefaults {
        MonitorDefaults {
            monitor_type: self.monitor_type.clone().unwrap_or_else(|| base.monitor_type.clone()),
            method: self
                .method
                .as_deref()
                .map_or_else(|| base.method.clone(), str::to_uppercase),
            interval: self.interval.unwrap_or(base.interval),
            retry_interval: self.retry_interval.unwrap_or(base.retry_interval),
            request_timeout: self.request_timeout.unwrap_or(base.request_timeout),
            valid_status_codes: self
                .valid_status_codes
                .clone()
                .unwrap_or_else(|| base.valid_status_codes.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LunalyticsSection {
    api_url: Option<String>,
    api_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RetrySection {
    max_attempts: Option<i64>,
    backoff_factor: Option<f64>,
    max_delay: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct NamespaceFilterSection {
    strategy: Option<String>,
    namespaces: Option<Vec<String>>,
    annotation_key: Option<String>,
    annotation_value: Option<String>,
}

/// Shape of the YAML configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    lunalytics: LunalyticsSection,
    retry: RetrySection,
    duplicate_handling: Option<String>,
    monitor_defaults: MonitorDefaultsOverride,
    namespace_filter: NamespaceFilterSection,
}

impl FileConfig {
    /// Parses YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ControllerError> {
        serde_yaml::from_str(text)
            .map_err(|e| ControllerError::InvalidConfig(format!("invalid config file: {}", e)))
    }

    /// Reads `path`; a missing or unreadable file yields an empty config.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match Self::from_yaml(&text) {
                Ok(config) => {
                    info!("Loaded configuration file {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Could not load config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Could not read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// How resources are turned into monitors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonitoringPolicy {
    pub defaults: MonitorDefaults,
    pub duplicate_handling: DuplicateHandling,
    pub namespace_filter: NamespaceFilterPolicy,
}

/// Complete operator configuration.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub api_url: String,
    pub api_token: String,
    pub retry: RetryPolicy,
    pub policy: MonitoringPolicy,
    /// Namespace to watch; all namespaces when `None`
    pub watch_namespace: Option<String>,
    pub metrics_port: u16,
}

fn parsed<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}: {:?} is not a valid value", key, raw);
            None
        }
    }
}

fn list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl OperatorConfig {
    /// Loads the configuration file named by `LUNALYTICS_CONFIG_FILE` and applies the process environment.
    pub fn load() -> Result<Self, ControllerError> {
        let path = std::env::var("LUNALYTICS_CONFIG_FILE")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let file = FileConfig::load(Path::new(&path));
        Self::from_sources(file, |key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Merges built-in defaults, `file` and the variables visible through `env`.
    pub fn from_sources(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ControllerError> {
        let api_url = env("LUNALYTICS_API_URL")
            .or(file.lunalytics.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_token = env("LUNALYTICS_API_TOKEN")
            .or(file.lunalytics.api_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ControllerError::InvalidConfig(
                "LUNALYTICS_API_TOKEN environment variable is required".to_string()
            ))?;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy::new(
            parsed(&env, "MAX_RETRY_ATTEMPTS")
                .or(file.retry.max_attempts)
                .unwrap_or(defaults.max_attempts),
            parsed(&env, "RETRY_BACKOFF_FACTOR")
                .or(file.retry.backoff_factor)
                .unwrap_or(defaults.backoff_factor),
            parsed(&env, "RETRY_MAX_DELAY")
                .or(file.retry.max_delay)
                .map_or(defaults.max_delay, Duration::from_secs),
        );

        let duplicate_handling = match env("DUPLICATE_HANDLING").or(file.duplicate_handling) {
            Some(raw) => raw.parse()?,
            None => DuplicateHandling::default(),
        };

        let env_defaults = MonitorDefaultsOverride {
            monitor_type: env("MONITOR_DEFAULT_TYPE"),
            method: env("MONITOR_DEFAULT_METHOD"),
            interval: parsed(&env, "MONITOR_DEFAULT_INTERVAL"),
            retry_interval: parsed(&env, "MONITOR_DEFAULT_RETRY_INTERVAL"),
            request_timeout: parsed(&env, "MONITOR_DEFAULT_REQUEST_TIMEOUT"),
            valid_status_codes: env("MONITOR_DEFAULT_VALID_STATUS_CODES").map(|raw| list(&raw)),
        };
        let monitor_defaults = file
            .monitor_defaults
            .overlay(env_defaults)
            .apply(&MonitorDefaults::default());

        let filter = file.namespace_filter;
        let namespace_filter = NamespaceFilterPolicy::from_parts(
            &env("NAMESPACE_FILTER_STRATEGY")
                .or(filter.strategy)
                .unwrap_or_else(|| "all".to_string()),
            env("NAMESPACE_FILTER_NAMESPACES")
                .map(|raw| list(&raw))
                .or(filter.namespaces)
                .unwrap_or_default(),
            env("NAMESPACE_FILTER_ANNOTATION_KEY").or(filter.annotation_key),
            env("NAMESPACE_FILTER_ANNOTATION_VALUE").or(filter.annotation_value),
        );
        if let NamespaceFilterPolicy::Unrecognized(strategy) = &namespace_filter {
            warn!("Unknown namespace filter strategy {:?}: no namespace will be monitored", strategy);
        }

        Ok(Self {
            api_url,
            api_token,
            retry,
            policy: MonitoringPolicy {
                defaults: monitor_defaults,
                duplicate_handling,
                namespace_filter,
            },
            watch_namespace: env("WATCH_NAMESPACE"),
            metrics_port: parsed(&env, "METRICS_PORT").unwrap_or(DEFAULT_METRICS_PORT),
        })
    }
}

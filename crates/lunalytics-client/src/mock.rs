//! Mock LunalyticsClient for unit testing
//!
//! This module provides a mock implementation of LunalyticsClientTrait that can be used
//! in unit tests without requiring a reachable Lunalytics instance.

use crate::error::LunalyticsError;
use crate::lunalytics_trait::LunalyticsClientTrait;
use crate::models::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Operations recorded by the mock, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `add_monitor` with the monitor URL
    Add(String),
    /// `edit_monitor` with the monitor id
    Edit(String),
    /// `delete_monitor` with the monitor id
    Delete(String),
    /// `get_monitor` with the monitor id
    Get(String),
}

/// Mock LunalyticsClient for testing
///
/// Monitors live in memory and receive random UUIDs as ids. Failures can be
/// queued per operation and are returned before the store is touched.
#[derive(Clone, Default)]
pub struct MockLunalyticsClient {
    base_url: String,
    monitors: Arc<Mutex<HashMap<String, MonitorResponse>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    failures: Arc<Mutex<HashMap<&'static str, VecDeque<LunalyticsError>>>>,
}

impl std::fmt::Debug for MockLunalyticsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLunalyticsClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MockLunalyticsClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Seed a monitor as if it had been created earlier.
    pub fn insert_monitor(&self, monitor: MonitorResponse) {
        lock(&self.monitors).insert(monitor.monitor_id.clone(), monitor);
    }

    /// Drop a monitor behind the operator's back.
    pub fn remove_monitor(&self, monitor_id: &str) {
        lock(&self.monitors).remove(monitor_id);
    }

    /// Look up a stored monitor.
    pub fn monitor(&self, monitor_id: &str) -> Option<MonitorResponse> {
        lock(&self.monitors).get(monitor_id).cloned()
    }

    /// Number of stored monitors.
    pub fn monitor_count(&self) -> usize {
        lock(&self.monitors).len()
    }

    /// Set the statistics reported for a monitor.
    pub fn set_stats(&self, monitor_id: &str, uptime_percentage: f64, average_latency: f64) {
        if let Some(monitor) = lock(&self.monitors).get_mut(monitor_id) {
            monitor.uptime_percentage = uptime_percentage;
            monitor.average_heartbeat_latency = average_latency;
        }
    }

    /// Queue an error for the next call of `operation`
    /// (`add_monitor`, `edit_monitor`, `delete_monitor` or `get_monitor`).
    pub fn fail_next(&self, operation: &'static str, error: LunalyticsError) {
        lock(&self.failures).entry(operation).or_default().push_back(error);
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Count of calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| predicate(c)).count()
    }

    /// Number of `add_monitor` calls.
    pub fn add_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, MockCall::Add(_)))
    }

    /// Number of `edit_monitor` calls.
    pub fn edit_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, MockCall::Edit(_)))
    }

    /// Number of `delete_monitor` calls.
    pub fn delete_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, MockCall::Delete(_)))
    }

    /// Number of `get_monitor` calls.
    pub fn get_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, MockCall::Get(_)))
    }

    /// Forget recorded calls.
    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }

    fn take_failure(&self, operation: &'static str) -> Option<LunalyticsError> {
        lock(&self.failures).get_mut(operation).and_then(VecDeque::pop_front)
    }

    fn response_for(monitor_id: String, monitor: &MonitorCreate) -> MonitorResponse {
        MonitorResponse {
            monitor_id,
            name: monitor.name.clone(),
            url: monitor.url.clone(),
            interval: monitor.interval,
            retry_interval: monitor.retry_interval,
            request_timeout: monitor.request_timeout,
            method: monitor.method.clone(),
            valid_status_codes: monitor.valid_status_codes.clone(),
            monitor_type: monitor.monitor_type.clone(),
            uptime_percentage: 100.0,
            ..MonitorResponse::default()
        }
    }
}

#[async_trait::async_trait]
impl LunalyticsClientTrait for MockLunalyticsClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn add_monitor(&self, monitor: &MonitorCreate) -> Result<MonitorResponse, LunalyticsError> {
        self.record(MockCall::Add(monitor.url.clone()));
        if let Some(err) = self.take_failure("add_monitor") {
            return Err(err);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let response = Self::response_for(id.clone(), monitor);
        lock(&self.monitors).insert(id, response.clone());
        Ok(response)
    }

    async fn edit_monitor(&self, update: &MonitorUpdate) -> Result<MonitorResponse, LunalyticsError> {
        self.record(MockCall::Edit(update.monitor_id.clone()));
        if let Some(err) = self.take_failure("edit_monitor") {
            return Err(err);
        }

        let mut monitors = lock(&self.monitors);
        let existing = monitors
            .get(&update.monitor_id)
            .ok_or_else(|| LunalyticsError::NotFound("Monitor not found".to_string()))?;
        let mut response = Self::response_for(update.monitor_id.clone(), &update.monitor);
        response.uptime_percentage = existing.uptime_percentage;
        response.average_heartbeat_latency = existing.average_heartbeat_latency;
        monitors.insert(update.monitor_id.clone(), response.clone());
        Ok(response)
    }

    async fn delete_monitor(&self, monitor_id: &str) -> Result<(), LunalyticsError> {
        self.record(MockCall::Delete(monitor_id.to_string()));
        if let Some(err) = self.take_failure("delete_monitor") {
            return Err(err);
        }

        lock(&self.monitors)
            .remove(monitor_id)
            .map(|_| ())
            .ok_or_else(|| LunalyticsError::NotFound("Monitor not found".to_string()))
    }

    async fn get_monitor(&self, monitor_id: &str) -> Result<MonitorResponse, LunalyticsError> {
        self.record(MockCall::Get(monitor_id.to_string()));
        if let Some(err) = self.take_failure("get_monitor") {
            return Err(err);
        }

        lock(&self.monitors)
            .get(monitor_id)
            .cloned()
            .ok_or_else(|| LunalyticsError::NotFound("Monitor not found".to_string()))
    }
}

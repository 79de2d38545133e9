//! LunalyticsClient trait for mocking
//!
//! This trait abstracts the Lunalytics API so the reconciler can run against
//! the HTTP client, the retry decorator or an in-memory mock.

use crate::error::LunalyticsError;
use crate::models::*;

/// Trait for Lunalytics API client operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
/// A missing monitor is reported as [`LunalyticsError::NotFound`].
#[async_trait::async_trait]
pub trait LunalyticsClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Create a monitor and return the stored record with its assigned id.
    async fn add_monitor(&self, monitor: &MonitorCreate) -> Result<MonitorResponse, LunalyticsError>;

    /// Replace the definition of an existing monitor.
    async fn edit_monitor(&self, update: &MonitorUpdate) -> Result<MonitorResponse, LunalyticsError>;

    /// Delete a monitor by id.
    async fn delete_monitor(&self, monitor_id: &str) -> Result<(), LunalyticsError>;

    /// Fetch a monitor by id.
    async fn get_monitor(&self, monitor_id: &str) -> Result<MonitorResponse, LunalyticsError>;
}

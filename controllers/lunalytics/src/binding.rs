//! Binding between a resource and its Lunalytics monitor id.
//!
//! The reconciler owns the lookup/record contract; where the id physically
//! lives (annotation or status) is up to the implementation.

use crate::error::ControllerError;
use crate::resource::ResourceIdentity;
use lunalytics_client::MonitorStats;

/// Synchronisation state reported for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Active,
    Error,
    Conflict,
}

/// Outcome of one reconciliation, as persisted by a [`BindingStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub state: SyncState,
    pub message: String,
    /// Bound monitor id after this reconciliation, if any
    pub monitor_id: Option<String>,
    /// The id differs from what was stored before
    pub binding_changed: bool,
    pub stats: Option<MonitorStats>,
}

impl SyncReport {
    pub fn active(message: impl Into<String>, monitor_id: String, binding_changed: bool, stats: MonitorStats) -> Self {
        Self {
            state: SyncState::Active,
            message: message.into(),
            monitor_id: Some(monitor_id),
            binding_changed,
            stats: Some(stats),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: SyncState::Error,
            message: message.into(),
            monitor_id: None,
            binding_changed: false,
            stats: None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            state: SyncState::Conflict,
            message: message.into(),
            monitor_id: None,
            binding_changed: false,
            stats: None,
        }
    }
}

/// Key-value store of `ResourceIdentity -> monitor id`.
#[async_trait::async_trait]
pub trait BindingStore: Send + Sync {
    /// Current binding of `identity`.
    async fn lookup(&self, identity: &ResourceIdentity) -> Result<Option<String>, ControllerError>;

    /// Persists the outcome of a reconciliation, including a changed binding.
    async fn record(&self, identity: &ResourceIdentity, report: &SyncReport) -> Result<(), ControllerError>;

    /// Forgets the binding of a deleted resource.
    async fn release(&self, identity: &ResourceIdentity) -> Result<(), ControllerError>;
}

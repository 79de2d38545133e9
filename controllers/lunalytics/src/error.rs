//! Controller-specific error types.
//!
//! Lunalytics failures that belong to a single reconciliation are reported on
//! the resource and never reach this type; `ControllerError` covers startup
//! and Kubernetes collaborator failures.

use kube::Error as KubeError;
use lunalytics_client::LunalyticsError;
use thiserror::Error;

/// Errors that can occur in the Lunalytics controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Lunalytics API error
    #[error("Lunalytics error: {0}")]
    Lunalytics(#[from] LunalyticsError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics/probe server failed
    #[error("HTTP server failed: {0}")]
    Server(String),
}

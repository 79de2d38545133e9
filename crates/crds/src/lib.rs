//! Lunalytics CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Lunalytics operator.

pub mod monitor;

pub use monitor::*;

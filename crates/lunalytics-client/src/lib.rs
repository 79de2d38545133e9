//! Lunalytics REST API Client
//!
//! A Rust client library for the Lunalytics uptime monitoring API.
//! Provides typed request/response models, a classified error type and a
//! retry decorator with exponential backoff and jitter.
//!
//! # Example
//!
//! ```no_run
//! use lunalytics_client::{LunalyticsClient, LunalyticsClientTrait, MonitorCreate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = LunalyticsClient::new(
//!     "https://lunalytics.xyz".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! let created = client.add_monitor(&MonitorCreate {
//!     name: "Ingress/web".to_string(),
//!     url: "https://example.com/".to_string(),
//!     monitor_type: "http".to_string(),
//!     method: "GET".to_string(),
//!     valid_status_codes: vec!["200-299".to_string()],
//!     interval: 30,
//!     retry_interval: 30,
//!     request_timeout: 30,
//! }).await?;
//!
//! let monitor = client.get_monitor(&created.monitor_id).await?;
//! println!("uptime: {}%", monitor.uptime_percentage);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Monitor operations**: add, edit, delete and fetch by id
//! - **Error classification**: every failure maps onto an [`ErrorClass`]
//! - **Retry Logic**: [`RetryingClient`] retries transient failures with jittered backoff
//! - **Mocking**: `MockLunalyticsClient` behind the `test-util` feature

pub mod client;
pub mod error;
pub mod models;
pub mod retry;
#[path = "trait.rs"]
pub mod lunalytics_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::LunalyticsClient;
pub use error::{ErrorClass, LunalyticsError};
pub use models::*;
pub use lunalytics_trait::LunalyticsClientTrait;
pub use retry::{retry, RetryHook, RetryPolicy, RetryingClient};
#[cfg(feature = "test-util")]
pub use mock::{MockCall, MockLunalyticsClient};

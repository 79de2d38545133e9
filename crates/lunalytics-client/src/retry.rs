//! # Retry Engine
//!
//! Retries Lunalytics calls that failed with a transient error, waiting with
//! exponential backoff and jitter between attempts.
//!
//! Wait after failed attempt `n`:
//! - `n == 1`: one second
//! - `n >= 2`: `min(backoff_factor^(n-1), max_delay)` scaled by a random factor in `[0.5, 1.0]`
//!
//! Waiting suspends only the calling task and is abandoned as soon as the
//! cancellation token fires.

use crate::error::LunalyticsError;
use crate::lunalytics_trait::LunalyticsClientTrait;
use crate::models::*;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

const DEFAULT_MAX_ATTEMPTS: i64 = 3;
const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
const DEFAULT_MAX_DELAY_SECS: u64 = 300;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts allowed; any negative value (conventionally `-1`) means unbounded
    pub max_attempts: i64,
    /// Base of the exponential backoff
    pub backoff_factor: f64,
    /// Upper bound for a single wait before jitter
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom settings.
    pub fn new(max_attempts: i64, backoff_factor: f64, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff_factor,
            max_delay,
        }
    }

    /// Whether retries continue until success or cancellation.
    pub fn is_unbounded(&self) -> bool {
        self.max_attempts < 0
    }

    /// True once `attempt` failed attempts use up the budget.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        !self.is_unbounded() && i64::from(attempt) >= self.max_attempts.max(1)
    }

    /// Wait before the next attempt, before jitter, after `attempt` failures.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_secs(1);
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.backoff_factor.powi(exponent);
        let capped = if secs.is_finite() {
            secs.min(self.max_delay.as_secs_f64())
        } else {
            self.max_delay.as_secs_f64()
        };
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Wait before the next attempt after `attempt` failures, jitter included.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if attempt <= 1 {
            return base;
        }
        let jitter: f64 = rand::thread_rng().gen_range(0.5..=1.0);
        base.mul_f64(jitter)
    }
}

/// Runs `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, exhausts the policy or is cancelled.
pub async fn retry<T, F, Fut, C>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation_name: &str,
    is_retryable: C,
    mut operation: F,
) -> Result<T, LunalyticsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LunalyticsError>>,
    C: Fn(&LunalyticsError) -> bool,
{
    let mut attempt: u32 = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }

        attempt = attempt.saturating_add(1);
        if policy.is_exhausted(attempt) {
            error!("Retry exhausted after {} attempts for {}: {}", attempt, operation_name, err);
            return Err(LunalyticsError::RetryExhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let wait = policy.delay_for_attempt(attempt);
        warn!(
            "Attempt {} failed for {}: {}. Retrying in {:.2} seconds...",
            attempt,
            operation_name,
            err,
            wait.as_secs_f64()
        );

        tokio::select! {
            () = cancel.cancelled() => {
                warn!("Retry of {} abandoned: shutdown requested", operation_name);
                return Err(LunalyticsError::Cancelled);
            }
            () = tokio::time::sleep(wait) => {}
        }
    }
}

/// Callback invoked with the operation name and attempt number before every retry.
pub type RetryHook = Arc<dyn Fn(&str, u32) + Send + Sync>;

/// Decorates a Lunalytics client so every call goes through [`retry`].
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
    cancel: CancellationToken,
    on_retry: Option<RetryHook>,
}

impl<C: std::fmt::Debug> std::fmt::Debug for RetryingClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("inner", &self.inner)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<C: LunalyticsClientTrait> RetryingClient<C> {
    /// Wraps `inner` with `policy`; waits abort when `cancel` fires.
    pub fn new(inner: C, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            inner,
            policy,
            cancel,
            on_retry: None,
        }
    }

    /// Registers a callback run before each retry (used for metrics).
    #[must_use]
    pub fn with_retry_hook(mut self, hook: RetryHook) -> Self {
        self.on_retry = Some(hook);
        self
    }

    async fn call<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T, LunalyticsError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LunalyticsError>>,
    {
        let attempts = AtomicU32::new(0);
        retry(
            &self.policy,
            &self.cancel,
            operation_name,
            LunalyticsError::is_retryable,
            || {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                if attempt > 1 {
                    if let Some(hook) = &self.on_retry {
                        hook(operation_name, attempt);
                    }
                }
                operation()
            },
        )
        .await
    }
}

#[async_trait::async_trait]
impl<C: LunalyticsClientTrait> LunalyticsClientTrait for RetryingClient<C> {
    fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    async fn add_monitor(&self, monitor: &MonitorCreate) -> Result<MonitorResponse, LunalyticsError> {
        self.call("add_monitor", || self.inner.add_monitor(monitor)).await
    }

    async fn edit_monitor(&self, update: &MonitorUpdate) -> Result<MonitorResponse, LunalyticsError> {
        self.call("edit_monitor", || self.inner.edit_monitor(update)).await
    }

    async fn delete_monitor(&self, monitor_id: &str) -> Result<(), LunalyticsError> {
        self.call("delete_monitor", || self.inner.delete_monitor(monitor_id)).await
    }

    async fn get_monitor(&self, monitor_id: &str) -> Result<MonitorResponse, LunalyticsError> {
        self.call("get_monitor", || self.inner.get_monitor(monitor_id)).await
    }
}

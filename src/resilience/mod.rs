//! Retry and circuit-breaker policy objects.
//!
//! These are configuration carriers only: the facade merges service defaults
//! with per-call values field by field and echoes the result on every
//! response and error, but no transport re-issues a failed call or short-circuits
//! on repeated failures. Interceptors or callers that want either behavior can
//! read the merged policy from `ApiResponse::config` / `ApiError::config`.

use std::time::Duration;

/// Retry policy. Every field is optional so per-call values can override
/// individual defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: Option<u32>,
    pub min_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub retry_on_status: Option<Vec<u16>>,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    pub fn with_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = Some(min);
        self.max_delay = Some(max.max(min));
        self
    }

    pub fn with_retry_on_status(mut self, statuses: Vec<u16>) -> Self {
        self.retry_on_status = Some(statuses);
        self
    }

    /// Field-by-field merge; fields set on `other` win.
    pub fn merged(&self, other: &RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_retries: other.max_retries.or(self.max_retries),
            min_delay: other.min_delay.or(self.min_delay),
            max_delay: other.max_delay.or(self.max_delay),
            retry_on_status: other
                .retry_on_status
                .clone()
                .or_else(|| self.retry_on_status.clone()),
        }
    }
}

/// Circuit-breaker policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitBreakerPolicy {
    pub enabled: Option<bool>,
    pub failure_threshold: Option<u32>,
    pub cooldown: Option<Duration>,
}

impl CircuitBreakerPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold.max(1));
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn merged(&self, other: &CircuitBreakerPolicy) -> CircuitBreakerPolicy {
        CircuitBreakerPolicy {
            enabled: other.enabled.or(self.enabled),
            failure_threshold: other.failure_threshold.or(self.failure_threshold),
            cooldown: other.cooldown.or(self.cooldown),
        }
    }
}

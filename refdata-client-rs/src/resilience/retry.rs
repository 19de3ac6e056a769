//! Retry with exponential backoff for recoverable errors
//!
//! The executor owns the retry loop; this module supplies the policy
//! (how many retries, which errors) and the delay schedule.

use std::fmt;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

use crate::error::ServiceError;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (0 means no retries)
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_interval: Duration,

    /// Maximum delay between two attempts
    pub max_interval: Duration,

    /// Multiplier applied to the delay after every retry
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryConfig {{ max_retries: {}, initial_interval: {:?}, max_interval: {:?}, multiplier: {} }}",
            self.max_retries, self.initial_interval, self.max_interval, self.multiplier
        )
    }
}

impl RetryConfig {
    /// Retry configuration with the given budget and first delay
    pub fn new(max_retries: u32, initial_interval: Duration) -> Self {
        Self {
            max_retries,
            initial_interval,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `retries` retries failed with `error`
    pub fn should_retry(&self, error: &ServiceError, retries: u32) -> bool {
        retries < self.max_retries && error.is_retryable()
    }

    /// Fresh delay schedule for one logical request
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule::new(self)
    }
}

/// Deterministic exponential delays: `initial · multiplier^n`, capped
pub struct BackoffSchedule {
    backoff: ExponentialBackoff,
    fallback: Duration,
}

impl BackoffSchedule {
    fn new(config: &RetryConfig) -> Self {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(config.initial_interval)
            .with_multiplier(config.multiplier)
            .with_randomization_factor(0.0)
            .with_max_interval(config.max_interval)
            .with_max_elapsed_time(None)
            .build();

        Self {
            backoff,
            fallback: config.max_interval,
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        self.backoff.next_backoff().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_doubles() {
        let config = RetryConfig::default();
        let mut schedule = config.schedule();

        assert_eq!(schedule.next_delay(), Duration::from_secs(1));
        assert_eq!(schedule.next_delay(), Duration::from_secs(2));
        assert_eq!(schedule.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn test_schedule_is_capped() {
        let config = RetryConfig {
            max_interval: Duration::from_secs(3),
            ..RetryConfig::default()
        };
        let mut schedule = config.schedule();
        schedule.next_delay();
        schedule.next_delay();
        assert_eq!(schedule.next_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_should_retry() {
        let config = RetryConfig::new(2, Duration::from_millis(10));

        assert!(config.should_retry(&ServiceError::network("reset"), 0));
        assert!(config.should_retry(&ServiceError::timeout("slow"), 1));
        assert!(!config.should_retry(&ServiceError::network("reset"), 2));
        assert!(!config.should_retry(&ServiceError::rate_limit(60), 0));
        assert!(!config.should_retry(&ServiceError::validation("bad"), 0));
    }
}

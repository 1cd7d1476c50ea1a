//! Retry policy for fan-out steps.

use crate::config::PipelineSettings;
use crate::error::GenerationError;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            max_retries: settings.max_fanout_retries,
            delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Whether a step that failed on `attempt` (1-based) gets another try.
    pub fn should_retry(&self, attempt: usize, error: &GenerationError) -> bool {
        attempt <= self.max_retries && error.is_retryable()
    }
}

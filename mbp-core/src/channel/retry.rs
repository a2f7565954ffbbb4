//! Reconnection policy for the notification channel.
//!
//! The default is [`RetryPolicy::Never`]: a failed or interrupted connection
//! drops the channel back to idle and the next `login`/`initialize` starts a
//! fresh one. [`RetryPolicy::Backoff`] retries with exponential backoff.

use std::time::Duration;

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Initial delay between reconnection attempts.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
    /// Maximum number of attempts (None = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as f64) as u64)
    }
}

/// What the channel does after a failed or interrupted connection
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RetryPolicy {
    /// Return to idle immediately
    #[default]
    Never,
    /// Retry with exponential backoff, re-resolving the token each attempt
    Backoff(ReconnectConfig),
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-indexed), or `None` to give up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match self {
            RetryPolicy::Never => None,
            RetryPolicy::Backoff(config) => {
                if config.max_attempts.is_some_and(|max| attempt >= max) {
                    None
                } else {
                    Some(config.delay_for_attempt(attempt))
                }
            }
        }
    }
}

//! Fixed-delay retry policy for the broker reconnect loop.

use std::time::Duration;

/// Default delay between reconnect attempts in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5000;

/// How the queue consumer reacts to broker connection failures.
///
/// The delay is fixed (no backoff). `max_attempts: None` retries forever,
/// which is the production setting; tests pass a zero delay and a bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between attempts.
    pub delay: Duration,
    /// Give up after this many consecutive failures; `None` never gives up.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry forever with a fixed delay.
    pub fn indefinite(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Retry at most `max_attempts` consecutive times.
    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts),
        }
    }

    /// Whether another attempt is allowed after `failures` consecutive failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::indefinite(Duration::from_millis(DEFAULT_RETRY_DELAY_MS))
    }
}

//! Retry policy for transient channel refusals

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::error::{Error, Result};

/// Default delay between channel allocation attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Fixed-delay retry policy, bounded or unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between attempts
    pub delay: Duration,
    /// Maximum attempts, `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Retry forever with a fixed delay
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Retry at most `max_attempts` times with a fixed delay
    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    /// Run `attempt` until it yields a value
    ///
    /// `Ok(None)` marks a transient refusal and is retried after the
    /// policy delay. Errors are returned immediately. Exhausting a bounded
    /// policy yields [`Error::ChannelRefused`].
    pub async fn run<T, F, Fut>(&self, clock: &dyn Clock, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if let Some(value) = attempt().await? {
                return Ok(value);
            }
            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(Error::ChannelRefused { attempts });
            }
            debug!(attempts, delay_ms = self.delay.as_millis() as u64, "channel refused, retrying");
            clock.sleep(self.delay).await;
        }
    }
}

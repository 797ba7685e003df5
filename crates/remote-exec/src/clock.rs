//! Time source used by the collector and the retry loop

use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::{Duration, Instant};

/// A source of time and timers
///
/// Executors default to [`SystemClock`]. Tests can inject a clock whose
/// sleeps complete immediately.
pub trait Clock: Send + Sync + 'static {
    /// The current instant
    fn now(&self) -> Instant;

    /// A future that completes after `duration`
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Wall clock backed by `async-io` timers, usable from any runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        async_io::Timer::after(duration).map(|_| ()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_sleeps() {
        let clock = SystemClock;
        let start = clock.now();
        futures::executor::block_on(clock.sleep(Duration::from_millis(20)));
        assert!(clock.now() - start >= Duration::from_millis(20));
    }
}

//! Per-job fetch spacing
//!
//! Every job owns one `RateLimiter`; jobs never share one, so a slow site
//! does not throttle the others.

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum delay between consecutive fetches of one job
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    last_release: Option<Instant>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_release: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Time left before the next `wait` would return immediately
    pub fn time_until_ready(&self, now: Instant) -> Duration {
        match self.last_release {
            None => Duration::ZERO,
            Some(last) => match now.checked_duration_since(last) {
                Some(elapsed) => self.delay.saturating_sub(elapsed),
                // clock went backwards; sleep the full delay
                None => self.delay,
            },
        }
    }

    /// Waits until `delay` has passed since the previous call returned
    ///
    /// The first call never blocks. Dropping the future before it completes
    /// leaves the limiter unchanged.
    pub async fn wait(&mut self) {
        let remaining = self.time_until_ready(Instant::now());
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
        self.last_release = Some(Instant::now());
    }
}

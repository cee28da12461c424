//! Bounded exponential backoff schedule

use std::time::Duration;

/// Delay before the first reconnect attempt
pub const FIRST_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Multiplier applied to the delay after a failed attempt
pub const RECONNECT_RATE: u32 = 2;

/// Delay cap
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Attempts before the routine gives up
pub const MAX_RECONNECT_COUNT: u32 = 12;

/// Reconnect schedule: sleep, attempt, grow the delay, repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first attempt
    pub first_delay: Duration,
    /// Multiplier applied after each failure
    pub rate: u32,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Total attempts
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            first_delay: FIRST_RECONNECT_DELAY,
            rate: RECONNECT_RATE,
            max_delay: MAX_RECONNECT_DELAY,
            max_attempts: MAX_RECONNECT_COUNT,
        }
    }
}

impl BackoffPolicy {
    /// Delay that follows `current` after a failed attempt
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(self.rate).min(self.max_delay)
    }

    /// The sleep taken before each attempt, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let mut delay = self.first_delay;
        (0..self.max_attempts).map(move |_| {
            let current = delay;
            delay = self.next_delay(delay);
            current
        })
    }

    /// Time spent sleeping when every attempt fails
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        self.delays().sum()
    }
}

//! Replay engine for publishing recorded MQTT traffic

mod engine;

use std::fmt;
use std::time::Duration;

use crate::storage::LogRecord;

pub use engine::Replayer;

/// How long to wait after each publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayPolicy {
    /// Use each record's own `time_delay`
    #[default]
    Recorded,
    /// Use the same delay for every record, including zero
    Fixed(Duration),
}

impl DelayPolicy {
    /// Policy for an optional override in milliseconds; `None` keeps the
    /// recorded timing
    #[must_use]
    pub fn from_override_ms(delay_ms: Option<u64>) -> Self {
        delay_ms.map_or(Self::Recorded, |ms| Self::Fixed(Duration::from_millis(ms)))
    }

    /// Delay to sleep after publishing `record`
    #[must_use]
    pub fn delay_for(&self, record: &LogRecord) -> Duration {
        match self {
            Self::Recorded => Duration::from_millis(record.time_delay),
            Self::Fixed(delay) => *delay,
        }
    }
}

impl fmt::Display for DelayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recorded => write!(f, "recorded delay"),
            Self::Fixed(delay) => write!(f, "{}ms delay", delay.as_millis()),
        }
    }
}

/// Counters for a finished replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Records written to the broker
    pub published: u64,
    /// Records dropped because no session could be established
    pub dropped: u64,
}

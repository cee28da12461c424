//! Recording engine for capturing MQTT traffic

mod engine;
mod session;

pub use engine::Recorder;
pub use session::RecordingSession;

/// Counters for a finished recording run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordSummary {
    /// Records appended to the log
    pub recorded: u64,
    /// Messages skipped because the payload was not JSON
    pub skipped: u64,
}

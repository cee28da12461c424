//! Per-run recording state

use std::path::Path;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::network::MessageHandler;
use crate::storage::{JsonlWriter, LogRecord};
use crate::{Mqtt2JsonlError, Result};

use super::RecordSummary;

/// State carried through one recording run: where records go, when the
/// last one was captured, and how many were kept or skipped.
pub struct RecordingSession {
    writer: JsonlWriter,
    last_capture: Instant,
    recorded: u64,
    skipped: u64,
}

impl RecordingSession {
    /// Create a session whose delay baseline is now
    #[must_use]
    pub fn new(writer: JsonlWriter) -> Self {
        Self {
            writer,
            last_capture: Instant::now(),
            recorded: 0,
            skipped: 0,
        }
    }

    /// Log file path
    #[must_use]
    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    /// Restart the delay baseline from now
    pub fn reset_baseline(&mut self) {
        self.last_capture = Instant::now();
    }

    /// Append `data` with the time elapsed since the previous capture
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be written
    pub fn capture(&mut self, topic: &str, data: Value) -> Result<LogRecord> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_capture);
        self.last_capture = now;

        let record = LogRecord {
            time_delay: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            topic: topic.to_string(),
            data,
        };

        self.writer.append(&record)?;
        self.recorded += 1;

        debug!(
            "Recorded {} after {}ms ({} total)",
            record.topic, record.time_delay, self.recorded
        );

        Ok(record)
    }

    /// Counters so far
    #[must_use]
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            recorded: self.recorded,
            skipped: self.skipped,
        }
    }
}

impl MessageHandler for RecordingSession {
    fn handle_message(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        let data: Value = match serde_json::from_slice(payload) {
            Ok(data) => data,
            Err(source) => {
                let err = Mqtt2JsonlError::PayloadDecode {
                    topic: topic.to_string(),
                    source,
                };
                warn!("{err}, skipping");
                self.skipped += 1;
                return Ok(());
            }
        };

        self.capture(topic, data)?;
        Ok(())
    }
}

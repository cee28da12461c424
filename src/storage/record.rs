//! Log record type

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Mqtt2JsonlError, Result};

/// One captured message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Milliseconds since the previous record (or recorder start)
    pub time_delay: u64,
    /// Exact topic the message arrived on
    pub topic: String,
    /// Decoded payload
    pub data: Value,
}

impl LogRecord {
    /// Parse one log line
    ///
    /// # Errors
    ///
    /// Returns [`Mqtt2JsonlError::MalformedRecord`] if the line is not a
    /// record or its topic is empty
    pub fn from_line(line: &str, line_number: usize) -> Result<Self> {
        let record: Self =
            serde_json::from_str(line).map_err(|e| Mqtt2JsonlError::MalformedRecord {
                line: line_number,
                reason: e.to_string(),
            })?;

        if record.topic.is_empty() {
            return Err(Mqtt2JsonlError::MalformedRecord {
                line: line_number,
                reason: "topic cannot be empty".to_string(),
            });
        }

        Ok(record)
    }

    /// Serialize as a single line, without the terminator
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be serialized
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Mqtt2JsonlError::Other(format!("Failed to serialize record: {e}")))
    }
}

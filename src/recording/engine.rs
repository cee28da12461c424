//! Recorder: subscribe, timestamp, append

use std::path::PathBuf;

use tracing::info;

use crate::network::{ConnectionManager, Transport};
use crate::storage::JsonlWriter;
use crate::{Mqtt2JsonlError, Result};

use super::session::RecordingSession;
use super::RecordSummary;

/// Captures every message matching a topic filter into a JSON-Lines log
pub struct Recorder {
    session: RecordingSession,
    filter: String,
}

impl Recorder {
    /// Validate the destination and filter before any network activity.
    ///
    /// An existing file is only replaced when `overwrite` is set; it is then
    /// truncated.
    ///
    /// # Errors
    ///
    /// Returns [`Mqtt2JsonlError::ExistingFile`],
    /// [`Mqtt2JsonlError::InvalidTopicFilter`] or an invalid-argument error
    /// for an empty path
    pub fn new(log_path: impl Into<PathBuf>, filter: &str, overwrite: bool) -> Result<Self> {
        let path = log_path.into();

        if path.as_os_str().is_empty() {
            return Err(Mqtt2JsonlError::InvalidArgument(
                "no JSONL file provided".to_string(),
            ));
        }

        let exists = path.exists();
        if exists && !overwrite {
            return Err(Mqtt2JsonlError::ExistingFile(path));
        }

        if !rumqttc::valid_filter(filter) {
            return Err(Mqtt2JsonlError::InvalidTopicFilter(filter.to_string()));
        }

        let writer = JsonlWriter::new(path);
        if exists {
            writer.truncate()?;
        }

        Ok(Self {
            session: RecordingSession::new(writer),
            filter: filter.to_string(),
        })
    }

    /// Topic filter being recorded
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Record until the session is closed or reconnection gives up.
    ///
    /// The first record's delay is measured from the start of this call.
    ///
    /// # Errors
    ///
    /// Returns connection, I/O or reconnect-exhausted errors
    pub async fn run<T: Transport>(
        &mut self,
        manager: &mut ConnectionManager<T>,
    ) -> Result<RecordSummary> {
        info!(
            "Starting to record {} into {}",
            self.filter,
            self.session.path().display()
        );

        self.session.reset_baseline();
        manager
            .connect_and_listen(&self.filter, &mut self.session)
            .await?;

        let summary = self.session.summary();
        info!(
            "Recording stopped: {} recorded, {} skipped",
            summary.recorded, summary.skipped
        );
        Ok(summary)
    }
}

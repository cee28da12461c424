//! Replayer: read, publish, sleep

use std::path::Path;

use tracing::{info, warn};

use crate::network::{ConnectionManager, PublishOutcome, Transport};
use crate::storage::JsonlReader;
use crate::Result;

use super::{DelayPolicy, ReplaySummary};

/// Publishes every record of a log, in file order, paced by a [`DelayPolicy`]
pub struct Replayer {
    reader: JsonlReader,
    policy: DelayPolicy,
}

impl Replayer {
    /// Open a recording for replay
    ///
    /// # Errors
    ///
    /// Returns [`crate::Mqtt2JsonlError::MissingFile`] if the log is absent
    pub fn open(log_path: &Path, policy: DelayPolicy) -> Result<Self> {
        Ok(Self {
            reader: JsonlReader::open(log_path)?,
            policy,
        })
    }

    /// Pacing in use
    #[must_use]
    pub fn policy(&self) -> DelayPolicy {
        self.policy
    }

    /// Publish each record, then sleep, until the log is exhausted.
    ///
    /// A malformed line stops the replay before anything for it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Mqtt2JsonlError::MalformedRecord`] or an I/O error
    pub async fn run<T: Transport>(
        self,
        manager: &mut ConnectionManager<T>,
    ) -> Result<ReplaySummary> {
        let Self { reader, policy } = self;
        let mut summary = ReplaySummary::default();

        info!("Replaying with {policy}");

        for record in reader {
            let record = record?;
            info!("{}", record.topic);

            match manager.publish(&record.topic, &record.data).await? {
                PublishOutcome::Sent => summary.published += 1,
                PublishOutcome::Dropped => summary.dropped += 1,
            }

            tokio::time::sleep(policy.delay_for(&record)).await;
        }

        if let Err(e) = manager.disconnect().await {
            warn!("Disconnect after replay failed: {e}");
        }

        if summary.dropped > 0 {
            warn!(
                "{} of {} records were dropped while disconnected",
                summary.dropped,
                summary.published + summary.dropped
            );
        }

        Ok(summary)
    }
}

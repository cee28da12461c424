//! JSON-Lines writer

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::record::LogRecord;
use crate::Result;

/// Appends records to a JSON-Lines file.
///
/// The file is opened and closed for every record, so a reader tailing the
/// log never sees more than one partial line.
#[derive(Debug, Clone)]
pub struct JsonlWriter {
    path: PathBuf,
}

impl JsonlWriter {
    /// Create a writer for `path`; nothing is touched until the first append
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being written
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empty the file, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created
    pub fn truncate(&self) -> Result<()> {
        File::create(&self.path)?;
        Ok(())
    }

    /// Append one record as a single line
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be serialized or written
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        let mut line = record.to_line()?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        Ok(())
    }
}

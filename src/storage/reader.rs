//! JSON-Lines reader

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use super::record::LogRecord;
use crate::{Mqtt2JsonlError, Result};

/// Sequential, single-pass reader over a recording
pub struct JsonlReader {
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl JsonlReader {
    /// Open an existing recording
    ///
    /// # Errors
    ///
    /// Returns [`Mqtt2JsonlError::MissingFile`] if the path is empty or not a
    /// file, or an I/O error if it cannot be opened
    pub fn open(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() || !path.is_file() {
            return Err(Mqtt2JsonlError::MissingFile(path.to_path_buf()));
        }

        let file = File::open(path)?;

        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_number: 0,
        })
    }

    /// Number of lines consumed so far
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl Iterator for JsonlReader {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        self.line_number += 1;

        Some(match line {
            Ok(line) => LogRecord::from_line(&line, self.line_number),
            Err(e) => Err(e.into()),
        })
    }
}

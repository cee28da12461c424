//! JSON-Lines storage for recordings
//!
//! One [`LogRecord`] per line, appended in arrival order.

mod reader;
mod record;
mod writer;

pub use reader::JsonlReader;
pub use record::LogRecord;
pub use writer::JsonlWriter;

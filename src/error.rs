//! Error types for mqtt2jsonl

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for mqtt2jsonl operations
pub type Result<T> = std::result::Result<T, Mqtt2JsonlError>;

/// Exit code for argument and file validation failures
pub const EXIT_VALIDATION: i32 = 1;

/// Exit code for unknown commands and runtime faults
pub const EXIT_RUNTIME: i32 = 2;

/// Why a connection attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// Host answered but nothing listens on the port
    Refused,
    /// Host name could not be resolved or reached
    Unreachable,
    /// Broker rejected the CONNECT (credentials, client id, ...)
    Rejected,
}

/// Errors that can occur in mqtt2jsonl
#[derive(Debug, Error)]
pub enum Mqtt2JsonlError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Could not establish a session with the broker
    #[error("Couldn't connect to the MQTT server {endpoint}: {detail}")]
    Connection {
        /// `host:port` that was dialled
        endpoint: String,
        /// Classified failure cause
        kind: ConnectFailure,
        /// Underlying transport message
        detail: String,
    },

    /// Record destination exists and overwrite was not requested
    #[error("To overwrite the existing '{}', you need to provide the force option", .0.display())]
    ExistingFile(PathBuf),

    /// Replay source is absent
    #[error("JSONL file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// Subscription pattern is not a valid MQTT topic filter
    #[error("Invalid subscription filter: {0}")]
    InvalidTopicFilter(String),

    /// Inbound payload is not JSON
    #[error("Payload on '{topic}' is not valid JSON: {source}")]
    PayloadDecode {
        /// Topic the payload arrived on
        topic: String,
        /// Decoder error
        source: serde_json::Error,
    },

    /// A log line could not be parsed as a record
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number in the log
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Backoff loop gave up
    #[error("Reconnect failed after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of attempts made
        attempts: u32,
    },

    /// Transport-level failure after the session was established
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid command-line argument
    #[error("{0}")]
    InvalidArgument(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Mqtt2JsonlError {
    /// Process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ExistingFile(_)
            | Self::MissingFile(_)
            | Self::ConfigError(_)
            | Self::InvalidArgument(_) => EXIT_VALIDATION,
            _ => EXIT_RUNTIME,
        }
    }

    /// One-line user-facing diagnostic naming the likely cause
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Connection {
                endpoint,
                kind: ConnectFailure::Refused,
                ..
            } => format!("Error: Could not connect to {endpoint}, is the port correct?"),
            Self::Connection {
                endpoint,
                kind: ConnectFailure::Unreachable,
                ..
            } => format!("Error: Could not connect to {endpoint}, is the server name correct?"),
            Self::Connection {
                endpoint,
                kind: ConnectFailure::Rejected,
                ..
            } => format!("Error: Could not connect to {endpoint}, are the server credentials correct?"),
            Self::InvalidTopicFilter(filter) => {
                format!("Error: topic ({filter}) wildcard is incorrect")
            }
            Self::ExistingFile(_) => self.to_string(),
            other => format!("Error: {other}"),
        }
    }
}

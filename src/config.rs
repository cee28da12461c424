//! Configuration types for mqtt2jsonl

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::{BackoffPolicy, Endpoint, KEEP_ALIVE_SECS, MAX_PACKET_SIZE};
use crate::{Mqtt2JsonlError, Result};

/// Default MQTT server
pub const DEFAULT_HOST: &str = "localhost";

/// Default MQTT port
pub const DEFAULT_PORT: u16 = 1883;

/// Default subscription filter, everything
pub const DEFAULT_TOPIC: &str = "#";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Broker connection settings
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Reconnect backoff settings
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Recording settings
    #[serde(default)]
    pub recording: RecordingConfig,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Server name or IP
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Largest MQTT packet accepted or sent, in bytes
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// Prefix for the generated client id
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_keep_alive() -> u64 {
    KEEP_ALIVE_SECS
}

fn default_max_packet_size() -> usize {
    MAX_PACKET_SIZE
}

fn default_client_id_prefix() -> String {
    "mqtt2jsonl".to_string()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keep_alive_secs: default_keep_alive(),
            max_packet_size: default_max_packet_size(),
            client_id_prefix: default_client_id_prefix(),
        }
    }
}

impl BrokerConfig {
    /// Endpoint described by this configuration
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port,
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            max_packet_size: self.max_packet_size,
        }
    }

    /// Client id unique to this process
    #[must_use]
    pub fn client_id(&self) -> String {
        format!("{}-{}", self.client_id_prefix, std::process::id())
    }
}

/// Reconnect backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first attempt, in seconds
    pub first_delay_secs: u64,
    /// Multiplier applied after each failure
    pub rate: u32,
    /// Upper bound on the delay, in seconds
    pub max_delay_secs: u64,
    /// Total attempts before giving up
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            first_delay_secs: policy.first_delay.as_secs(),
            rate: policy.rate,
            max_delay_secs: policy.max_delay.as_secs(),
            max_attempts: policy.max_attempts,
        }
    }
}

impl BackoffConfig {
    /// Backoff policy described by this configuration
    #[must_use]
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            first_delay: Duration::from_secs(self.first_delay_secs),
            rate: self.rate,
            max_delay: Duration::from_secs(self.max_delay_secs),
            max_attempts: self.max_attempts,
        }
    }
}

/// Recording settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Subscription filter used when none is given on the command line
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Mqtt2JsonlError::ConfigError(format!("Failed to read config file: {e}"))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Mqtt2JsonlError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.broker.host.is_empty() {
            return Err(Mqtt2JsonlError::ConfigError(
                "broker.host cannot be empty".to_string(),
            ));
        }

        if self.broker.port == 0 {
            return Err(Mqtt2JsonlError::ConfigError(
                "broker.port cannot be 0".to_string(),
            ));
        }

        // rumqttc refuses keep-alives under a second
        if self.broker.keep_alive_secs == 0 {
            return Err(Mqtt2JsonlError::ConfigError(
                "broker.keep_alive_secs cannot be 0".to_string(),
            ));
        }

        if self.broker.max_packet_size == 0 || self.broker.max_packet_size > MAX_PACKET_SIZE {
            return Err(Mqtt2JsonlError::ConfigError(format!(
                "broker.max_packet_size must be between 1 and {MAX_PACKET_SIZE}"
            )));
        }

        if self.backoff.rate == 0 {
            return Err(Mqtt2JsonlError::ConfigError(
                "backoff.rate cannot be 0".to_string(),
            ));
        }

        if self.backoff.max_attempts == 0 {
            return Err(Mqtt2JsonlError::ConfigError(
                "backoff.max_attempts cannot be 0".to_string(),
            ));
        }

        if self.backoff.first_delay_secs > self.backoff.max_delay_secs {
            return Err(Mqtt2JsonlError::ConfigError(format!(
                "backoff.first_delay_secs ({}) exceeds backoff.max_delay_secs ({})",
                self.backoff.first_delay_secs, self.backoff.max_delay_secs
            )));
        }

        Ok(())
    }
}

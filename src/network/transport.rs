//! Transport session interface

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use rumqttc::QoS;

use crate::Result;

/// Broker address and session parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server name or IP
    pub host: String,
    /// Server port
    pub port: u16,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// Largest packet accepted or sent, in bytes
    pub max_packet_size: usize,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Something the broker session reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection attempt completed; zero means accepted
    ConnAck {
        /// CONNACK return code
        reason_code: u8,
    },
    /// An inbound PUBLISH
    Message {
        /// Exact topic the message arrived on
        topic: String,
        /// Raw payload
        payload: Bytes,
    },
    /// The session ended; zero means it was asked to
    Disconnected {
        /// Disconnect reason
        reason_code: u8,
    },
}

/// A single connection to a publish/subscribe bus.
///
/// Implementations are driven by exactly one
/// [`ConnectionManager`](super::ConnectionManager) and are never shared.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open a fresh session and wait for the broker to accept it
    ///
    /// # Errors
    ///
    /// Returns a connection error if the broker cannot be reached or refuses
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<()>;

    /// Re-establish the last session after it dropped
    ///
    /// # Errors
    ///
    /// Returns a connection error if the attempt fails
    async fn reconnect(&mut self) -> Result<()>;

    /// Subscribe to a topic filter
    ///
    /// # Errors
    ///
    /// Returns error if there is no session or the request cannot be sent
    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<()>;

    /// Publish a payload and wait until it has been written to the network
    ///
    /// # Errors
    ///
    /// Returns error if there is no session or the write fails
    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<()>;

    /// Close the session gracefully
    ///
    /// # Errors
    ///
    /// Returns error if the DISCONNECT cannot be sent
    async fn disconnect(&mut self) -> Result<()>;

    /// Wait for the next session event
    ///
    /// # Errors
    ///
    /// Returns error if there is no session to wait on
    async fn next_event(&mut self) -> Result<TransportEvent>;
}

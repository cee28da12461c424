//! Network layer for mqtt2jsonl
//!
//! A [`Transport`] owns one broker session; [`ConnectionManager`] drives it
//! through connect, subscribe-on-connect and bounded reconnection.

mod backoff;
mod lifecycle;
mod mqtt;
mod transport;

pub use backoff::BackoffPolicy;
pub use lifecycle::{ConnectionManager, ConnectionState, MessageHandler, PublishOutcome};
pub use mqtt::MqttTransport;
pub use transport::{Endpoint, Transport, TransportEvent};

/// Keep-alive interval sent to the broker
pub const KEEP_ALIVE_SECS: u64 = 300;

/// Largest packet MQTT 3.1.1 can frame (remaining length of 268,435,455)
pub const MAX_PACKET_SIZE: usize = 268_435_455;

/// Capacity of the client request channel
pub const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Reason code reported for a successful CONNACK
pub const REASON_SUCCESS: u8 = 0;

/// Reason code reported when the network drops without a DISCONNECT
pub const REASON_CONNECTION_LOST: u8 = 7;

/// Upper bound on a graceful disconnect
pub const DISCONNECT_TIMEOUT_MS: u64 = 2000;

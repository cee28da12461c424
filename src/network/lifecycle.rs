//! Connection lifecycle: connect, subscribe-on-connect, bounded reconnection

use bytes::Bytes;
use rumqttc::QoS;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{Mqtt2JsonlError, Result};

use super::backoff::BackoffPolicy;
use super::transport::{Endpoint, Transport, TransportEvent};
use super::REASON_SUCCESS;

/// Connection state as seen by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session
    Disconnected,
    /// An attempt is in flight
    Connecting,
    /// Session accepted by the broker
    Connected,
}

/// What happened to a publish request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Written to the session
    Sent,
    /// Not connected; nothing was sent or queued
    Dropped,
}

/// Receives inbound messages from the listen loop
pub trait MessageHandler {
    /// Handle one message. Returning an error ends the listen loop.
    ///
    /// # Errors
    ///
    /// Implementations return an error for faults that must stop the run
    fn handle_message(&mut self, topic: &str, payload: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Subscription {
    filter: String,
    qos: QoS,
}

/// Owns a [`Transport`] and keeps it connected.
///
/// Holds at most one subscription, which is re-issued every time the
/// session comes up.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    endpoint: Endpoint,
    backoff: BackoffPolicy,
    state: ConnectionState,
    subscription: Option<Subscription>,
    degraded: bool,
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager for `endpoint` using the default backoff policy
    #[must_use]
    pub fn new(transport: T, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
            backoff: BackoffPolicy::default(),
            state: ConnectionState::Disconnected,
            subscription: None,
            degraded: false,
        }
    }

    /// Replace the backoff policy
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the session is up
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Whether the last backoff run gave up
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Active subscription filter, if any
    #[must_use]
    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.filter.as_str())
    }

    /// Borrow the transport
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give back the transport
    #[must_use]
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Open a session without blocking on inbound traffic.
    ///
    /// On failure the manager is left disconnected and the error is logged
    /// before being returned.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the broker cannot be reached, or a
    /// transport error if re-subscribing fails
    pub async fn connect(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;

        match self.transport.connect(&self.endpoint).await {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.on_connect(REASON_SUCCESS).await
            }
            Err(e) => {
                error!("Couldn't connect to the MQTT server {}: {e}", self.endpoint);
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Subscribe to `filter` and dispatch inbound messages to `handler`
    /// until the session is closed on purpose or reconnection gives up.
    ///
    /// # Errors
    ///
    /// Returns the initial connection error, a handler error, or
    /// [`Mqtt2JsonlError::ReconnectExhausted`]
    pub async fn connect_and_listen<H: MessageHandler>(
        &mut self,
        filter: &str,
        handler: &mut H,
    ) -> Result<()> {
        self.subscription = Some(Subscription {
            filter: filter.to_string(),
            qos: QoS::AtLeastOnce,
        });

        self.connect().await?;
        self.listen(handler).await
    }

    async fn listen<H: MessageHandler>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            match self.transport.next_event().await? {
                TransportEvent::ConnAck { reason_code } => {
                    if reason_code == REASON_SUCCESS {
                        self.state = ConnectionState::Connected;
                    }
                    self.on_connect(reason_code).await?;
                }
                TransportEvent::Message { topic, payload } => {
                    debug!(
                        "topic: {topic} data: {}",
                        String::from_utf8_lossy(&payload)
                    );
                    handler.handle_message(&topic, &payload)?;
                }
                TransportEvent::Disconnected { reason_code } => {
                    self.on_disconnect(reason_code);
                    if reason_code == REASON_SUCCESS {
                        return Ok(());
                    }
                    self.reconnect_with_backoff().await?;
                }
            }
        }
    }

    /// Called after every connection attempt; zero means accepted.
    ///
    /// On success the active subscription is re-issued at at-least-once.
    ///
    /// # Errors
    ///
    /// Returns error if the subscribe request cannot be sent
    pub async fn on_connect(&mut self, reason_code: u8) -> Result<()> {
        if reason_code != REASON_SUCCESS {
            debug!("Failed to connect, return code: {reason_code}");
            return Ok(());
        }

        info!("Connected to MQTT server: {}", self.endpoint);

        if let Some(subscription) = &self.subscription {
            self.transport
                .subscribe(&subscription.filter, subscription.qos)
                .await?;
            info!("Subscribed to {}", subscription.filter);
        }

        Ok(())
    }

    /// Called on any disconnect; non-zero means the drop was not requested
    pub fn on_disconnect(&mut self, reason_code: u8) {
        self.state = ConnectionState::Disconnected;

        if reason_code == REASON_SUCCESS {
            info!("Disconnected from {}", self.endpoint);
        } else {
            warn!(
                "Unexpected MQTT disconnection from {} (code {reason_code})",
                self.endpoint
            );
        }
    }

    /// Sleep, attempt, grow the delay; give up after the policy's attempt
    /// count and mark the manager degraded.
    ///
    /// # Errors
    ///
    /// Returns [`Mqtt2JsonlError::ReconnectExhausted`] when every attempt
    /// failed, or a transport error if re-subscribing fails
    pub async fn reconnect_with_backoff(&mut self) -> Result<()> {
        let policy = self.backoff;

        for (attempt, delay) in (1u32..).zip(policy.delays()) {
            info!("Reconnecting in {} seconds...", delay.as_secs_f64());
            tokio::time::sleep(delay).await;

            self.state = ConnectionState::Connecting;
            match self.transport.reconnect().await {
                Ok(()) => {
                    info!("Reconnected successfully after {attempt} attempt(s)");
                    self.state = ConnectionState::Connected;
                    self.degraded = false;
                    return self.on_connect(REASON_SUCCESS).await;
                }
                Err(e) => {
                    self.state = ConnectionState::Disconnected;
                    error!(
                        "{e}. Reconnect failed ({attempt}/{}). Retrying...",
                        policy.max_attempts
                    );
                }
            }
        }

        self.degraded = true;
        error!(
            "Reconnect failed after {} attempts, giving up",
            policy.max_attempts
        );
        Err(Mqtt2JsonlError::ReconnectExhausted {
            attempts: policy.max_attempts,
        })
    }

    /// Publish `payload` as JSON text, connecting lazily first.
    ///
    /// If the session is still down the message is dropped, not queued.
    ///
    /// # Errors
    ///
    /// Returns error only if `payload` cannot be serialized
    pub async fn publish<P: Serialize + ?Sized>(
        &mut self,
        topic: &str,
        payload: &P,
    ) -> Result<PublishOutcome> {
        if !self.is_connected() && self.connect().await.is_err() {
            debug!("Lazy connect failed before publishing to {topic}");
        }

        if !self.is_connected() {
            warn!("Not connected, dropping message for {topic}");
            return Ok(PublishOutcome::Dropped);
        }

        let text = serde_json::to_vec(payload)
            .map_err(|e| Mqtt2JsonlError::Other(format!("Failed to serialize payload: {e}")))?;

        match self.transport.publish(topic, Bytes::from(text)).await {
            Ok(()) => Ok(PublishOutcome::Sent),
            Err(e) => {
                warn!("Publish to {topic} failed, dropping message: {e}");
                self.state = ConnectionState::Disconnected;
                Ok(PublishOutcome::Dropped)
            }
        }
    }

    /// Close the session if it is up
    ///
    /// # Errors
    ///
    /// Returns error if the DISCONNECT cannot be sent
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        let result = self.transport.disconnect().await;
        self.on_disconnect(REASON_SUCCESS);
        result
    }
}

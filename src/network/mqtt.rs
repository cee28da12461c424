//! MQTT transport built on `rumqttc`

use std::io;
use std::time::Duration;

use bytes::Bytes;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS,
};
use tracing::{debug, warn};

use crate::error::ConnectFailure;
use crate::{Mqtt2JsonlError, Result};

use super::transport::{Endpoint, Transport, TransportEvent};
use super::{
    DISCONNECT_TIMEOUT_MS, REASON_CONNECTION_LOST, REASON_SUCCESS, REQUEST_CHANNEL_CAPACITY,
};

/// One live client/event-loop pair
struct Session {
    endpoint: Endpoint,
    client: AsyncClient,
    eventloop: EventLoop,
}

/// [`Transport`] over an MQTT 3.1.1 connection.
///
/// `rumqttc` only talks to the network while its event loop is polled, so
/// every operation here drives the loop until the step it started is done.
pub struct MqttTransport {
    client_id: String,
    session: Option<Session>,
}

impl MqttTransport {
    /// Create a transport that will identify itself as `client_id`
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            session: None,
        }
    }

    fn session(&mut self) -> Result<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| Mqtt2JsonlError::Transport("no active MQTT session".to_string()))
    }
}

impl Transport for MqttTransport {
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        let mut options = MqttOptions::new(&self.client_id, &endpoint.host, endpoint.port);
        options.set_keep_alive(endpoint.keep_alive);
        options.set_clean_session(true);
        options.set_max_packet_size(endpoint.max_packet_size, endpoint.max_packet_size);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let mut session = Session {
            endpoint: endpoint.clone(),
            client,
            eventloop,
        };

        wait_for_connack(&mut session).await?;
        self.session = Some(session);
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        // Polling after an error makes the event loop dial again
        let session = self.session()?;
        wait_for_connack(session).await
    }

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<()> {
        let session = self.session()?;
        session
            .client
            .subscribe(filter, qos)
            .await
            .map_err(|e| Mqtt2JsonlError::Transport(format!("subscribe to {filter} failed: {e}")))
    }

    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<()> {
        let session = self.session()?;
        session
            .client
            .publish_bytes(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| Mqtt2JsonlError::Transport(format!("publish to {topic} failed: {e}")))?;

        loop {
            match session.eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Publish(_))) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(classify_connection_error(&session.endpoint, &e)),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        session
            .client
            .disconnect()
            .await
            .map_err(|e| Mqtt2JsonlError::Transport(format!("disconnect failed: {e}")))?;

        let flushed = tokio::time::timeout(Duration::from_millis(DISCONNECT_TIMEOUT_MS), async {
            loop {
                match session.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            warn!("Timed out waiting for DISCONNECT to be sent");
        }

        Ok(())
    }

    async fn next_event(&mut self) -> Result<TransportEvent> {
        let session = self.session()?;

        loop {
            match session.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(TransportEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload,
                    });
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return Ok(TransportEvent::ConnAck {
                        reason_code: ack.code as u8,
                    });
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    return Ok(TransportEvent::Disconnected {
                        reason_code: REASON_SUCCESS,
                    });
                }
                Ok(event) => debug!("MQTT event: {event:?}"),
                Err(e) => {
                    debug!("MQTT connection error: {e}");
                    return Ok(TransportEvent::Disconnected {
                        reason_code: REASON_CONNECTION_LOST,
                    });
                }
            }
        }
    }
}

/// Poll until the broker answers the CONNECT
async fn wait_for_connack(session: &mut Session) -> Result<()> {
    loop {
        match session.eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    return Ok(());
                }
                return Err(classify_connection_error(
                    &session.endpoint,
                    &ConnectionError::ConnectionRefused(ack.code),
                ));
            }
            Ok(_) => {}
            Err(e) => return Err(classify_connection_error(&session.endpoint, &e)),
        }
    }
}

/// Map a `rumqttc` failure onto a tagged error.
///
/// Protocol state faults, such as an oversized packet, happen on a live
/// session and say nothing about reachability.
fn classify_connection_error(endpoint: &Endpoint, err: &ConnectionError) -> Mqtt2JsonlError {
    if let ConnectionError::MqttState(state) = err {
        return Mqtt2JsonlError::Transport(format!(
            "MQTT session with {endpoint} failed: {state}"
        ));
    }

    let kind = match err {
        ConnectionError::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            ConnectFailure::Refused
        }
        ConnectionError::ConnectionRefused(_) => ConnectFailure::Rejected,
        _ => ConnectFailure::Unreachable,
    };

    Mqtt2JsonlError::Connection {
        endpoint: endpoint.to_string(),
        kind,
        detail: err.to_string(),
    }
}

// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The broker client used by the pipeline, and its rumqttc implementation.
//!
//! The pipeline only talks to a [`BrokerClient`]. Framing, keep-alive,
//! QoS 1/2 acknowledgement and reconnects of an established connection are
//! the client's business.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error, info, warn};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet,
    QoS, Transport,
};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::config::SinkConfig;
use crate::error::{BrokerError, ConfigError};

/// Capacity of the request channel between [`AsyncClient`] and its event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 100;

/// Largest packet the MQTT protocol can express; used when no limit is configured.
const PROTOCOL_MAX_PACKET_SIZE: usize = 268_435_455;

/// How long `disconnect` waits for the DISCONNECT packet to leave.
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// Network timeout handed to rumqttc when no connect deadline is configured.
const UNBOUNDED_NETWORK_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;

/// Transport used by the pipeline to reach the broker.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Open the connection. Resolves once the broker has accepted it.
    async fn connect(
        &self,
        port: u16,
        host: &str,
        server_name: Option<&str>,
    ) -> Result<(), BrokerError>;

    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        duplicate: bool,
        retain: bool,
    ) -> Result<(), BrokerError>;

    async fn disconnect(&self) -> Result<(), BrokerError>;
}

struct Session {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

/// [`BrokerClient`] backed by a rumqttc [`AsyncClient`].
///
/// Nothing touches the network until [`connect`](BrokerClient::connect) is
/// called. The event loop then runs on its own task and reconnects on
/// transport errors, up to `reconnect-attempts` times in a row.
pub struct RumqttcBrokerClient {
    client_id: String,
    config: SinkConfig,
    session: Mutex<Option<Session>>,
}

impl RumqttcBrokerClient {
    pub fn new(config: SinkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.trust_all {
            return Err(ConfigError::Unsupported {
                option: "trust-all",
                reason: "the rustls transport always verifies the broker certificate",
            });
        }

        let client_id = match &config.client_id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => {
                // rumqttc needs a non-empty id, so one is generated either way.
                let id = format!("mqtt-sink-{}", uuid::Uuid::new_v4());
                if !config.auto_generated_client_id {
                    info!("[{id}] No client-id configured, using a generated one");
                }
                id
            }
        };

        Ok(Self {
            client_id,
            config,
            session: Mutex::new(None),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn mqtt_options(&self, host: &str, port: u16) -> Result<MqttOptions, ConfigError> {
        let config = &self.config;
        let mut opts = MqttOptions::new(&self.client_id, host, port);
        opts.set_keep_alive(config.keep_alive());
        opts.set_clean_session(config.clean_session);
        opts.set_inflight(config.max_inflight_queue.max(1));
        opts.set_request_channel_capacity(REQUEST_CHANNEL_CAPACITY);

        let max_packet = config.max_message_size().unwrap_or(PROTOCOL_MAX_PACKET_SIZE);
        opts.set_max_packet_size(max_packet, max_packet);

        if let Some(user) = &config.username {
            opts.set_credentials(user.clone(), config.password.clone().unwrap_or_default());
        }

        if config.ssl {
            opts.set_transport(Transport::tls_with_default_config());
        }

        if config.will_flag {
            if let Some(topic) = &config.will_topic {
                let message = config.will_message.clone().unwrap_or_default();
                opts.set_last_will(LastWill::new(
                    topic.clone(),
                    message,
                    config.will_qos()?,
                    config.will_retain,
                ));
            } else {
                warn!(
                    "[{}] will-flag is set but no will-topic is configured; no last will installed",
                    self.client_id
                );
            }
        }

        Ok(opts)
    }

    /// Timeout rumqttc applies to each TCP/TLS connect and CONNECT/CONNACK
    /// exchange, including reconnects.
    ///
    /// Kept one second above the connect deadline so that the first connect
    /// always ends in [`BrokerError::Timeout`] rather than a network error.
    fn network_timeout_secs(&self) -> u64 {
        match self.config.connect_timeout_seconds {
            0 => UNBOUNDED_NETWORK_TIMEOUT_SECS,
            secs => secs.saturating_add(1),
        }
    }
}

#[async_trait]
impl BrokerClient for RumqttcBrokerClient {
    async fn connect(
        &self,
        port: u16,
        host: &str,
        server_name: Option<&str>,
    ) -> Result<(), BrokerError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }

        if let Some(name) = server_name {
            debug!(
                "[{}] Server name '{name}' requested; TLS name is taken from the host",
                self.client_id
            );
        }

        let opts = self.mqtt_options(host, port).map_err(|e| BrokerError::Connect {
            host: host.to_string(),
            port,
            reason: e.to_string(),
        })?;
        let (client, mut eventloop) = AsyncClient::new(opts, REQUEST_CHANNEL_CAPACITY);
        eventloop
            .network_options
            .set_connection_timeout(self.network_timeout_secs());

        let (ready_tx, ready_rx) = oneshot::channel();
        let driver = tokio::spawn(drive_event_loop(
            self.client_id.clone(),
            eventloop,
            ready_tx,
            self.config.reconnect_attempts,
            self.config.reconnect_interval(),
        ));

        let timeout = self.config.connect_timeout();
        let ready = if timeout.is_zero() {
            Ok(ready_rx.await)
        } else {
            tokio::time::timeout(timeout, ready_rx).await
        };

        let connect_error = |reason: String| BrokerError::Connect {
            host: host.to_string(),
            port,
            reason,
        };
        let outcome = match ready {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(connect_error(reason)),
            Ok(Err(_)) => Err(connect_error("event loop stopped before CONNACK".to_string())),
            Err(_) => Err(BrokerError::Timeout(timeout)),
        };

        match outcome {
            Ok(()) => {
                info!("[{}] Connected to MQTT broker {host}:{port}", self.client_id);
                *session = Some(Session { client, driver });
                Ok(())
            }
            Err(e) => {
                driver.abort();
                Err(e)
            }
        }
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        _duplicate: bool,
        retain: bool,
    ) -> Result<(), BrokerError> {
        // DUP is set by rumqttc itself when it retransmits.
        let client = match self.session.lock().await.as_ref() {
            Some(session) => session.client.clone(),
            None => return Err(BrokerError::NotConnected),
        };

        client
            .publish_bytes(topic, qos, retain, payload)
            .await
            .map_err(BrokerError::from)
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        let Some(Session { client, mut driver }) = self.session.lock().await.take() else {
            return Ok(());
        };

        let sent = client
            .disconnect()
            .await
            .map_err(|e| BrokerError::Disconnect(e.to_string()));

        if tokio::time::timeout(DISCONNECT_GRACE, &mut driver).await.is_err() {
            debug!("[{}] Event loop did not stop in time; aborting", self.client_id);
            driver.abort();
        }
        sent
    }
}

/// Poll the event loop until DISCONNECT is sent or reconnects are exhausted.
///
/// The first CONNACK (or the first error before it) is reported on `ready`.
async fn drive_event_loop(
    client_id: String,
    mut eventloop: EventLoop,
    ready: oneshot::Sender<Result<(), String>>,
    reconnect_attempts: u32,
    reconnect_interval: Duration,
) {
    let mut ready = Some(ready);
    let mut failures: u32 = 0;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    failures = 0;
                    match ready.take() {
                        Some(tx) => {
                            let _ = tx.send(Ok(()));
                        }
                        None => info!("[{client_id}] Reconnected to MQTT broker"),
                    }
                } else if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(format!("connection refused: {:?}", ack.code)));
                    return;
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("[{client_id}] DISCONNECT sent, stopping event loop");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(e.to_string()));
                    return;
                }

                failures += 1;
                if reconnect_attempts != 0 && failures > reconnect_attempts {
                    error!(
                        "[{client_id}] MQTT connection lost, giving up after \
                         {reconnect_attempts} reconnect attempts: {e}"
                    );
                    return;
                }
                warn!("[{client_id}] MQTT eventloop error (will reconnect): {e}");
                tokio::time::sleep(reconnect_interval).await;
            }
        }
    }
}

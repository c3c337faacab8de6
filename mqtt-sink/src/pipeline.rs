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

//! The publish pipeline: connection gate, addressing and the send loop.

use std::future::Future;

use futures::{Stream, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::watch;

use crate::addressing::{self, PublishDefaults};
use crate::client::BrokerClient;
use crate::config::SinkConfig;
use crate::error::{ConfigError, PipelineError};
use crate::message::OutboundMessage;

/// Lifecycle of a [`PublishPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Connecting,
    Streaming,
    Draining,
    Disconnected,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Disconnected | PipelineState::Failed)
    }
}

/// Outcome of a pipeline run that reached the end of its stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub published: usize,
    /// Messages dropped because no topic could be resolved.
    pub skipped: usize,
}

/// Read-only view of the pipeline's connected flag, for health checks.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    connected: watch::Receiver<bool>,
}

impl ReadinessProbe {
    pub fn is_ready(&self) -> bool {
        *self.connected.borrow()
    }
}

/// Publishes a stream of [`OutboundMessage`]s to an MQTT broker.
///
/// Messages are handled strictly one at a time, in stream order. The first
/// message opens the connection; every message is then resolved to a topic,
/// QoS and retain flag, encoded and handed to the [`BrokerClient`]. When the
/// stream ends (or the shutdown signal fires) the client is disconnected.
pub struct PublishPipeline<C> {
    id: String,
    host: String,
    port: u16,
    server_name: Option<String>,
    defaults: PublishDefaults,
    client: C,
    state: PipelineState,
    /// Written only by the connection gate.
    connected: watch::Sender<bool>,
}

impl<C: BrokerClient> PublishPipeline<C> {
    /// Create a pipeline. Fails if the configuration is invalid.
    pub fn new(config: &SinkConfig, client: C) -> Result<Self, ConfigError> {
        config.validate()?;

        let id = config
            .client_id
            .clone()
            .or_else(|| config.channel_name.clone())
            .unwrap_or_else(|| "mqtt-sink".to_string());
        let (connected, _) = watch::channel(false);

        Ok(Self {
            id,
            host: config.host.clone(),
            port: config.effective_port(),
            server_name: config.server_name.clone(),
            defaults: PublishDefaults::from_config(config)?,
            client,
            state: PipelineState::Idle,
            connected,
        })
    }

    pub fn readiness(&self) -> ReadinessProbe {
        ReadinessProbe {
            connected: self.connected.subscribe(),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Publish every message of `messages`, then disconnect.
    pub async fn run<S>(&mut self, messages: S) -> Result<PipelineSummary, PipelineError>
    where
        S: Stream<Item = OutboundMessage>,
    {
        self.run_until(messages, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops admitting messages once `shutdown`
    /// completes. A message already being published is finished first.
    pub async fn run_until<S, F>(
        &mut self,
        messages: S,
        shutdown: F,
    ) -> Result<PipelineSummary, PipelineError>
    where
        S: Stream<Item = OutboundMessage>,
        F: Future<Output = ()>,
    {
        if self.state.is_terminal() {
            return Err(PipelineError::Terminated);
        }

        info!(
            "[{}] Starting MQTT publish pipeline (broker={}:{}, topic={})",
            self.id,
            self.host,
            self.port,
            self.defaults.topic.as_deref().unwrap_or("<per message>")
        );

        tokio::pin!(messages);
        tokio::pin!(shutdown);
        let mut summary = PipelineSummary::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("[{}] Shutdown signal received", self.id);
                    None
                }
                message = messages.next() => message,
            };
            let Some(message) = next else {
                break;
            };

            if let Err(e) = self.process(message, &mut summary).await {
                return Err(self.fail(e).await);
            }
        }

        self.transition(PipelineState::Draining);
        self.disconnect().await;
        self.transition(PipelineState::Disconnected);
        info!(
            "[{}] MQTT publish pipeline finished ({} published, {} skipped)",
            self.id, summary.published, summary.skipped
        );
        Ok(summary)
    }

    async fn process(
        &mut self,
        message: OutboundMessage,
        summary: &mut PipelineSummary,
    ) -> Result<(), PipelineError> {
        self.ensure_connected().await?;

        let Some(address) = addressing::resolve(&message, &self.defaults) else {
            error!("[{}] Ignoring message - no topic set", self.id);
            summary.skipped += 1;
            return Ok(());
        };

        let payload = message.into_payload().into_bytes();
        let result = self
            .client
            .publish(&address.topic, payload, address.qos, false, address.retain)
            .await;
        if let Err(source) = result {
            return Err(PipelineError::Publish {
                topic: address.topic,
                source,
            });
        }

        summary.published += 1;
        Ok(())
    }

    /// Connect on first use. A no-op once connected.
    async fn ensure_connected(&mut self) -> Result<(), PipelineError> {
        if *self.connected.borrow() {
            return Ok(());
        }

        self.transition(PipelineState::Connecting);
        self.client
            .connect(self.port, &self.host, self.server_name.as_deref())
            .await
            .map_err(PipelineError::Connect)?;

        self.connected.send_replace(true);
        info!("[{}] Connected to {}:{}", self.id, self.host, self.port);
        self.transition(PipelineState::Streaming);
        Ok(())
    }

    async fn fail(&mut self, e: PipelineError) -> PipelineError {
        error!(
            "[{}] An error has been caught while sending a MQTT message to the broker: {e}",
            self.id
        );
        self.transition(PipelineState::Failed);
        if *self.connected.borrow() {
            self.disconnect().await;
        }
        e
    }

    // Best effort: failures are logged, never escalated.
    async fn disconnect(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("[{}] Failed to disconnect from MQTT broker: {e}", self.id);
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("[{}] {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}

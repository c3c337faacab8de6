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

//! Error types for the MQTT sink.

use thiserror::Error;

/// Problems with a [`SinkConfig`](crate::SinkConfig), reported before the
/// pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("broker host must not be empty")]
    MissingHost,
    #[error("port must be in 1..=65535")]
    InvalidPort,
    #[error("invalid {field} level {value}: expected 0, 1 or 2")]
    InvalidQos { field: &'static str, value: u8 },
    #[error("{option} is not supported: {reason}")]
    Unsupported {
        option: &'static str,
        reason: &'static str,
    },
}

/// Failures reported by a [`BrokerClient`](crate::BrokerClient).
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("connect to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("connect timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("disconnect failed: {0}")]
    Disconnect(String),
    #[error("client is not connected")]
    NotConnected,
}

impl From<rumqttc::ClientError> for BrokerError {
    fn from(e: rumqttc::ClientError) -> Self {
        BrokerError::Publish(e.to_string())
    }
}

/// Fatal outcomes of [`PublishPipeline::run`](crate::PublishPipeline::run).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("broker connection failed: {0}")]
    Connect(#[source] BrokerError),
    #[error("publishing to '{topic}' failed: {source}")]
    Publish {
        topic: String,
        #[source]
        source: BrokerError,
    },
    #[error("pipeline already terminated")]
    Terminated,
}

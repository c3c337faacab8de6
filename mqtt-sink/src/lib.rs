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

//! Outbound MQTT sink.
//!
//! Takes an ordered stream of messages and publishes them to an MQTT broker,
//! connecting lazily on the first message and disconnecting when the stream
//! ends.
//!
//! # Example
//!
//! ```ignore
//! use futures::stream;
//! use mqtt_sink::{OutboundMessage, PublishPipeline, RumqttcBrokerClient, SinkConfig};
//!
//! let config = SinkConfig::builder("broker.local")
//!     .topic("alerts/high-temp")
//!     .qos(1)
//!     .build();
//!
//! let client = RumqttcBrokerClient::new(config.clone())?;
//! let mut pipeline = PublishPipeline::new(&config, client)?;
//! let messages = stream::iter(vec![
//!     OutboundMessage::plain("hello"),
//!     OutboundMessage::addressed(serde_json::json!({"a": 1})).topic("alerts/other").retain(true),
//! ]);
//! pipeline.run(messages).await?;
//! ```

pub mod addressing;
pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod payload;
pub mod pipeline;

pub use addressing::{Address, PublishDefaults};
pub use client::{BrokerClient, RumqttcBrokerClient};
pub use config::{SinkConfig, SinkConfigBuilder};
pub use error::{BrokerError, ConfigError, PipelineError};
pub use message::{OutboundMessage, Overrides};
pub use payload::{Payload, Scalar};
pub use pipeline::{PipelineState, PipelineSummary, PublishPipeline, ReadinessProbe};
pub use rumqttc::QoS;

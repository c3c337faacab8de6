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

//! Reads lines from stdin and publishes each one to an MQTT broker.
//!
//! Lines holding a JSON object or array are published as JSON, anything else
//! as plain text. Configure with `MQTT_*` environment variables.

use std::env;

use anyhow::{anyhow, Context, Result};
use futures::stream;
use log::{info, warn};
use mqtt_sink::{OutboundMessage, Payload, PublishPipeline, RumqttcBrokerClient, SinkConfig};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

fn config_from_env() -> Result<SinkConfig> {
    let host = env::var("MQTT_HOST").map_err(|_| anyhow!("MQTT_HOST not set"))?;
    let mut builder = SinkConfig::builder(host).channel_name("publish-gateway");

    if let Ok(port) = env::var("MQTT_PORT") {
        builder = builder.port(port.parse().context("Invalid MQTT_PORT")?);
    }
    if let Ok(topic) = env::var("MQTT_TOPIC") {
        builder = builder.topic(topic);
    }
    if let Ok(qos) = env::var("MQTT_QOS") {
        builder = builder.qos(qos.parse().context("Invalid MQTT_QOS")?);
    }
    if let Ok(client_id) = env::var("MQTT_CLIENT_ID") {
        builder = builder.client_id(client_id);
    }
    if let Ok(username) = env::var("MQTT_USERNAME") {
        builder = builder.username(username);
    }
    if let Ok(password) = env::var("MQTT_PASSWORD") {
        builder = builder.password(password);
    }
    if let Ok(ssl) = env::var("MQTT_SSL") {
        builder = builder.ssl(ssl.parse().context("Invalid MQTT_SSL")?);
    }

    Ok(builder.build())
}

fn line_to_message(line: String) -> OutboundMessage {
    match serde_json::from_str::<Value>(&line) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => {
            OutboundMessage::plain(Payload::Structured(value))
        }
        _ => OutboundMessage::plain(line),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config_from_env()?;
    let client = RumqttcBrokerClient::new(config.clone())?;
    info!("Publishing stdin as client '{}'", client.client_id());

    let mut pipeline = PublishPipeline::new(&config, client)?;
    let readiness = pipeline.readiness();

    let lines = BufReader::new(tokio::io::stdin()).lines();
    let messages = stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((line_to_message(line), lines)),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read stdin: {e}");
                None
            }
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    let summary = pipeline.run_until(messages, shutdown).await?;
    info!(
        "Done: {} published, {} skipped (connected: {})",
        summary.published,
        summary.skipped,
        readiness.is_ready()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lines_are_structured() {
        let msg = line_to_message(r#"{"temp": 21}"#.to_string());
        assert!(matches!(msg.payload(), Payload::Structured(_)));
    }

    #[test]
    fn test_other_lines_are_text() {
        assert_eq!(line_to_message("42".to_string()).payload(), &Payload::Text("42".into()));
        assert_eq!(line_to_message("hi".to_string()).payload(), &Payload::Text("hi".into()));
    }
}

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

//! Configuration types for the MQTT sink.

use std::time::Duration;

use rumqttc::QoS;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_TLS_PORT: u16 = 8883;

/// Connection and publishing options for the MQTT sink.
///
/// Read once when the pipeline is built. Option names follow the kebab-case
/// spelling (`keep-alive-seconds`, `max-inflight-queue`, ...) so the struct
/// can be deserialized straight from a channel's configuration block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SinkConfig {
    /// MQTT broker hostname or IP.
    pub host: String,
    /// Broker port. Defaults to 1883, or 8883 when `ssl` is set.
    #[serde(default)]
    pub port: Option<u16>,
    /// Optional virtual host / server name passed along with the connect request.
    #[serde(default)]
    pub server_name: Option<String>,
    /// MQTT client ID. One is generated when absent.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub auto_generated_client_id: bool,
    #[serde(default = "default_true")]
    pub auto_keep_alive: bool,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default = "default_true", alias = "auto-clean-session")]
    pub clean_session: bool,
    #[serde(default)]
    pub will_flag: bool,
    #[serde(default)]
    pub will_retain: bool,
    #[serde(default)]
    pub will_qos: u8,
    /// Topic of the last will. A will is only installed when `will_flag` is set
    /// and this is present.
    #[serde(default)]
    pub will_topic: Option<String>,
    #[serde(default)]
    pub will_message: Option<String>,
    #[serde(default)]
    pub trust_all: bool,
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,
    #[serde(default = "default_max_inflight_queue")]
    pub max_inflight_queue: u16,
    /// Largest packet accepted or sent, in bytes. `-1` (or any value <= 0) means unbounded.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: i64,
    /// Consecutive transport failures tolerated after the connection is up. 0 retries forever.
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
    #[serde(default = "default_reconnect_interval_seconds")]
    pub reconnect_interval_seconds: u64,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Default topic for messages that do not carry their own.
    #[serde(default)]
    pub topic: Option<String>,
    /// Channel name, used as the default topic when `topic` is not set.
    #[serde(default)]
    pub channel_name: Option<String>,
    /// Default QoS level (0, 1 or 2).
    #[serde(default)]
    pub qos: u8,
}

fn default_true() -> bool {
    true
}

fn default_keep_alive_seconds() -> u64 {
    30
}

fn default_max_inflight_queue() -> u16 {
    10
}

fn default_max_message_size() -> i64 {
    -1
}

fn default_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_interval_seconds() -> u64 {
    1
}

fn default_connect_timeout_seconds() -> u64 {
    60
}

impl SinkConfig {
    /// Start building a new config for the given broker host.
    pub fn builder(host: impl Into<String>) -> SinkConfigBuilder {
        SinkConfigBuilder {
            config: SinkConfig {
                host: host.into(),
                port: None,
                server_name: None,
                client_id: None,
                auto_generated_client_id: false,
                auto_keep_alive: true,
                ssl: false,
                clean_session: true,
                will_flag: false,
                will_retain: false,
                will_qos: 0,
                will_topic: None,
                will_message: None,
                trust_all: false,
                keep_alive_seconds: default_keep_alive_seconds(),
                max_inflight_queue: default_max_inflight_queue(),
                max_message_size: default_max_message_size(),
                reconnect_attempts: default_reconnect_attempts(),
                reconnect_interval_seconds: default_reconnect_interval_seconds(),
                connect_timeout_seconds: default_connect_timeout_seconds(),
                username: None,
                password: None,
                topic: None,
                channel_name: None,
                qos: 0,
            },
        }
    }

    /// Check the options that would otherwise fail later, mid-stream.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.port == Some(0) {
            return Err(ConfigError::InvalidPort);
        }
        qos_from_level("qos", self.qos)?;
        qos_from_level("will-qos", self.will_qos)?;
        Ok(())
    }

    pub fn effective_port(&self) -> u16 {
        match self.port {
            Some(port) => port,
            None if self.ssl => DEFAULT_TLS_PORT,
            None => DEFAULT_PORT,
        }
    }

    /// The configured topic, falling back to the channel name.
    pub fn default_topic(&self) -> Option<&str> {
        self.topic.as_deref().or(self.channel_name.as_deref())
    }

    pub fn default_qos(&self) -> Result<QoS, ConfigError> {
        qos_from_level("qos", self.qos)
    }

    pub fn will_qos(&self) -> Result<QoS, ConfigError> {
        qos_from_level("will-qos", self.will_qos)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_seconds)
    }

    /// Keep-alive interval, or zero when keep-alive is disabled.
    pub fn keep_alive(&self) -> Duration {
        if self.auto_keep_alive {
            Duration::from_secs(self.keep_alive_seconds)
        } else {
            Duration::ZERO
        }
    }

    pub fn max_message_size(&self) -> Option<usize> {
        usize::try_from(self.max_message_size).ok().filter(|&n| n > 0)
    }
}

/// Map a numeric QoS level to the protocol enum.
pub fn qos_from_level(field: &'static str, level: u8) -> Result<QoS, ConfigError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        value => Err(ConfigError::InvalidQos { field, value }),
    }
}

/// Builder for [`SinkConfig`].
pub struct SinkConfigBuilder {
    config: SinkConfig,
}

impl SinkConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    pub fn server_name(mut self, server_name: impl Into<String>) -> Self {
        self.config.server_name = Some(server_name.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = Some(client_id.into());
        self
    }

    pub fn auto_generated_client_id(mut self, enabled: bool) -> Self {
        self.config.auto_generated_client_id = enabled;
        self
    }

    pub fn auto_keep_alive(mut self, enabled: bool) -> Self {
        self.config.auto_keep_alive = enabled;
        self
    }

    pub fn ssl(mut self, enabled: bool) -> Self {
        self.config.ssl = enabled;
        self
    }

    pub fn trust_all(mut self, enabled: bool) -> Self {
        self.config.trust_all = enabled;
        self
    }

    pub fn clean_session(mut self, enabled: bool) -> Self {
        self.config.clean_session = enabled;
        self
    }

    /// Install a last will published by the broker if this client drops off.
    pub fn will(
        mut self,
        topic: impl Into<String>,
        message: impl Into<String>,
        qos: u8,
        retain: bool,
    ) -> Self {
        self.config.will_flag = true;
        self.config.will_topic = Some(topic.into());
        self.config.will_message = Some(message.into());
        self.config.will_qos = qos;
        self.config.will_retain = retain;
        self
    }

    pub fn keep_alive_seconds(mut self, seconds: u64) -> Self {
        self.config.keep_alive_seconds = seconds;
        self
    }

    pub fn max_inflight_queue(mut self, depth: u16) -> Self {
        self.config.max_inflight_queue = depth;
        self
    }

    pub fn max_message_size(mut self, bytes: i64) -> Self {
        self.config.max_message_size = bytes;
        self
    }

    pub fn reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.reconnect_attempts = attempts;
        self
    }

    pub fn reconnect_interval_seconds(mut self, seconds: u64) -> Self {
        self.config.reconnect_interval_seconds = seconds;
        self
    }

    pub fn connect_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.connect_timeout_seconds = seconds;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.config.topic = Some(topic.into());
        self
    }

    pub fn channel_name(mut self, name: impl Into<String>) -> Self {
        self.config.channel_name = Some(name.into());
        self
    }

    pub fn qos(mut self, qos: u8) -> Self {
        self.config.qos = qos;
        self
    }

    /// Build the config.
    pub fn build(self) -> SinkConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let config: SinkConfig = serde_json::from_str(r#"{"host": "broker.local"}"#).unwrap();

        assert_eq!(config.effective_port(), 1883);
        assert!(config.auto_keep_alive);
        assert!(config.clean_session);
        assert!(!config.will_flag);
        assert!(!config.will_retain);
        assert!(!config.trust_all);
        assert_eq!(config.max_inflight_queue, 10);
        assert_eq!(config.reconnect_attempts, 5);
        assert_eq!(config.reconnect_interval(), Duration::from_secs(1));
        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.keep_alive(), Duration::from_secs(30));
        assert_eq!(config.max_message_size(), None);
        assert_eq!(config.default_qos().unwrap(), QoS::AtMostOnce);
        assert_eq!(config.default_topic(), None);
    }

    #[test]
    fn test_kebab_case_options() {
        let config: SinkConfig = serde_json::from_str(
            r#"{
                "host": "broker.local",
                "client-id": "sink-1",
                "auto-clean-session": false,
                "keep-alive-seconds": 10,
                "max-message-size": 4096,
                "qos": 2
            }"#,
        )
        .unwrap();

        assert_eq!(config.client_id.as_deref(), Some("sink-1"));
        assert!(!config.clean_session);
        assert_eq!(config.keep_alive(), Duration::from_secs(10));
        assert_eq!(config.max_message_size(), Some(4096));
        assert_eq!(config.default_qos().unwrap(), QoS::ExactlyOnce);
    }

    #[test]
    fn test_tls_default_port() {
        let config = SinkConfig::builder("broker.local").ssl(true).build();
        assert_eq!(config.effective_port(), 8883);

        let config = SinkConfig::builder("broker.local").ssl(true).port(9000).build();
        assert_eq!(config.effective_port(), 9000);
    }

    #[test]
    fn test_topic_falls_back_to_channel_name() {
        let config = SinkConfig::builder("h").channel_name("readings").build();
        assert_eq!(config.default_topic(), Some("readings"));

        let config = SinkConfig::builder("h").channel_name("readings").topic("t/1").build();
        assert_eq!(config.default_topic(), Some("t/1"));
    }

    #[test]
    fn test_keep_alive_disabled() {
        let config = SinkConfig::builder("h").auto_keep_alive(false).build();
        assert_eq!(config.keep_alive(), Duration::ZERO);
    }

    #[test]
    fn test_validate() {
        assert!(SinkConfig::builder("broker.local").build().validate().is_ok());
        assert_eq!(
            SinkConfig::builder("  ").build().validate(),
            Err(ConfigError::MissingHost)
        );
        assert_eq!(
            SinkConfig::builder("h").port(0).build().validate(),
            Err(ConfigError::InvalidPort)
        );
        assert_eq!(
            SinkConfig::builder("h").qos(3).build().validate(),
            Err(ConfigError::InvalidQos { field: "qos", value: 3 })
        );
        assert_eq!(
            SinkConfig::builder("h").will("w", "bye", 7, false).build().validate(),
            Err(ConfigError::InvalidQos { field: "will-qos", value: 7 })
        );
    }

    #[test]
    fn test_missing_host_rejected_by_serde() {
        assert!(serde_json::from_str::<SinkConfig>(r#"{"port": 1883}"#).is_err());
    }
}

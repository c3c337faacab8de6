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

//! Resolves where and how a message is published.

use rumqttc::QoS;

use crate::config::SinkConfig;
use crate::error::ConfigError;
use crate::message::OutboundMessage;

/// Pipeline-wide fallbacks for messages without overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishDefaults {
    pub topic: Option<String>,
    pub qos: QoS,
}

impl PublishDefaults {
    pub fn from_config(config: &SinkConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            topic: config.default_topic().map(str::to_owned),
            qos: config.default_qos()?,
        })
    }
}

/// The effective destination of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
}

/// Compute the topic, QoS and retain flag for `message`.
///
/// Returns `None` when neither the message nor the defaults name a topic.
pub fn resolve(message: &OutboundMessage, defaults: &PublishDefaults) -> Option<Address> {
    let (topic, qos, retain) = match message.overrides() {
        None => (defaults.topic.as_deref(), defaults.qos, false),
        Some(o) => (
            o.topic.as_deref().or(defaults.topic.as_deref()),
            o.qos.unwrap_or(defaults.qos),
            o.retain,
        ),
    };

    Some(Address {
        topic: topic?.to_owned(),
        qos,
        retain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults(topic: Option<&str>, qos: QoS) -> PublishDefaults {
        PublishDefaults {
            topic: topic.map(str::to_owned),
            qos,
        }
    }

    #[test]
    fn test_plain_uses_defaults() {
        let defaults = defaults(Some("t/1"), QoS::AtLeastOnce);
        let addr = resolve(&OutboundMessage::plain("x"), &defaults).unwrap();
        assert_eq!(
            addr,
            Address {
                topic: "t/1".into(),
                qos: QoS::AtLeastOnce,
                retain: false
            }
        );
    }

    #[test]
    fn test_overrides_win() {
        let msg = OutboundMessage::addressed("x")
            .topic("t/2")
            .qos(QoS::ExactlyOnce)
            .retain(true);
        let addr = resolve(&msg, &defaults(Some("t/1"), QoS::AtMostOnce)).unwrap();
        assert_eq!(addr.topic, "t/2");
        assert_eq!(addr.qos, QoS::ExactlyOnce);
        assert!(addr.retain);
    }

    #[test]
    fn test_unset_overrides_fall_back() {
        let msg = OutboundMessage::addressed("x").retain(true);
        let addr = resolve(&msg, &defaults(Some("t/1"), QoS::AtLeastOnce)).unwrap();
        assert_eq!(addr.topic, "t/1");
        assert_eq!(addr.qos, QoS::AtLeastOnce);
        assert!(addr.retain);
    }

    #[test]
    fn test_addressed_topic_without_default() {
        let msg = OutboundMessage::addressed("x").topic("only/here");
        let addr = resolve(&msg, &defaults(None, QoS::AtMostOnce)).unwrap();
        assert_eq!(addr.topic, "only/here");
    }

    #[test]
    fn test_no_topic_anywhere() {
        let defaults = defaults(None, QoS::AtMostOnce);
        assert!(resolve(&OutboundMessage::plain("x"), &defaults).is_none());
        let msg = OutboundMessage::addressed("x").qos(QoS::AtLeastOnce);
        assert!(resolve(&msg, &defaults).is_none());
    }

    #[test]
    fn test_defaults_from_config() {
        let config = SinkConfig::builder("h").channel_name("chan").qos(1).build();
        assert_eq!(
            PublishDefaults::from_config(&config).unwrap(),
            defaults(Some("chan"), QoS::AtLeastOnce)
        );
    }
}

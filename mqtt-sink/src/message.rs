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

//! Messages accepted by the publish pipeline.

use rumqttc::QoS;

use crate::payload::Payload;

/// Per-message overrides of the pipeline defaults. Unset fields fall back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub topic: Option<String>,
    pub qos: Option<QoS>,
    pub retain: bool,
}

/// A message flowing through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Published to the default topic with the default QoS, not retained.
    Plain(Payload),
    Addressed {
        payload: Payload,
        overrides: Overrides,
    },
}

impl OutboundMessage {
    pub fn plain(payload: impl Into<Payload>) -> Self {
        OutboundMessage::Plain(payload.into())
    }

    /// Start an addressed message; chain [`topic`](Self::topic),
    /// [`qos`](Self::qos) and [`retain`](Self::retain) to set overrides.
    pub fn addressed(payload: impl Into<Payload>) -> Self {
        OutboundMessage::Addressed {
            payload: payload.into(),
            overrides: Overrides::default(),
        }
    }

    pub fn topic(self, topic: impl Into<String>) -> Self {
        self.with_overrides(|o| o.topic = Some(topic.into()))
    }

    pub fn qos(self, qos: QoS) -> Self {
        self.with_overrides(|o| o.qos = Some(qos))
    }

    pub fn retain(self, retain: bool) -> Self {
        self.with_overrides(|o| o.retain = retain)
    }

    // Setting an override turns a plain message into an addressed one.
    fn with_overrides(self, f: impl FnOnce(&mut Overrides)) -> Self {
        let (payload, mut overrides) = match self {
            OutboundMessage::Plain(payload) => (payload, Overrides::default()),
            OutboundMessage::Addressed { payload, overrides } => (payload, overrides),
        };
        f(&mut overrides);
        OutboundMessage::Addressed { payload, overrides }
    }

    pub fn payload(&self) -> &Payload {
        match self {
            OutboundMessage::Plain(payload) => payload,
            OutboundMessage::Addressed { payload, .. } => payload,
        }
    }

    pub fn overrides(&self) -> Option<&Overrides> {
        match self {
            OutboundMessage::Plain(_) => None,
            OutboundMessage::Addressed { overrides, .. } => Some(overrides),
        }
    }

    pub fn into_payload(self) -> Payload {
        match self {
            OutboundMessage::Plain(payload) => payload,
            OutboundMessage::Addressed { payload, .. } => payload,
        }
    }
}

impl<T: Into<Payload>> From<T> for OutboundMessage {
    fn from(payload: T) -> Self {
        OutboundMessage::Plain(payload.into())
    }
}

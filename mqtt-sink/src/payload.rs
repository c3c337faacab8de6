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

//! Message payloads and their conversion to MQTT wire bytes.
//!
//! A [`Payload`] is resolved to bytes with the following precedence:
//!
//! 1. [`Payload::Structured`] (JSON object or array) is encoded as JSON.
//! 2. [`Payload::Text`] and [`Payload::Scalar`] are written as their string
//!    form, without JSON quoting.
//! 3. [`Payload::Bytes`] is passed through.
//! 4. [`Payload::Buffer`] is passed through without copying.
//! 5. [`Payload::Other`] (anything else serializable) is encoded as JSON.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

/// Primitive values that are published as their textual representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::UInt(v) => write!(f, "{v}"),
            // JSON number form keeps the fraction of whole floats ("1.0").
            Scalar::Float(v) => match serde_json::Number::from_f64(*v) {
                Some(n) => write!(f, "{n}"),
                None => write!(f, "{v}"),
            },
            Scalar::Char(v) => write!(f, "{v}"),
        }
    }
}

/// The body of an outbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A JSON object or array.
    Structured(Value),
    Text(String),
    Scalar(Scalar),
    Bytes(Vec<u8>),
    /// An already shared buffer, handed to the client as is.
    Buffer(Bytes),
    /// Any other value, kept in its JSON form.
    Other(Value),
}

impl Payload {
    /// Capture any serializable value.
    ///
    /// The value is first converted to JSON and then classified like a
    /// [`Value`], so a struct or map becomes [`Payload::Structured`] while a
    /// bare string becomes [`Payload::Text`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Self> {
        serde_json::to_value(value).map(Payload::from)
    }

    /// Encode the payload into the bytes put on the wire.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Payload::Structured(value) | Payload::Other(value) => Bytes::from(json_bytes(&value)),
            Payload::Text(text) => Bytes::from(text),
            Payload::Scalar(scalar) => Bytes::from(scalar.to_string()),
            Payload::Bytes(raw) => Bytes::from(raw),
            Payload::Buffer(buffer) => buffer,
        }
    }
}

// Serializing a `Value` only fails for maps with non-string keys, which
// `Value` cannot hold.
fn json_bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|_| value.to_string().into_bytes())
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => Payload::Structured(value),
            Value::String(text) => Payload::Text(text),
            Value::Bool(v) => Payload::Scalar(Scalar::Bool(v)),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Payload::Scalar(Scalar::Int(v))
                } else if let Some(v) = n.as_u64() {
                    Payload::Scalar(Scalar::UInt(v))
                } else if let Some(v) = n.as_f64() {
                    Payload::Scalar(Scalar::Float(v))
                } else {
                    Payload::Other(Value::Number(n))
                }
            }
            Value::Null => Payload::Other(Value::Null),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(raw: Vec<u8>) -> Self {
        Payload::Bytes(raw)
    }
}

impl From<&[u8]> for Payload {
    fn from(raw: &[u8]) -> Self {
        Payload::Bytes(raw.to_vec())
    }
}

impl From<Bytes> for Payload {
    fn from(buffer: Bytes) -> Self {
        Payload::Buffer(buffer)
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$ty> for Payload {
                fn from(v: $ty) -> Self {
                    Payload::Scalar(Scalar::$variant(v as $target))
                }
            }
        )*
    };
}

scalar_from! {
    bool => Bool as bool,
    char => Char as char,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_is_json() {
        let bytes = Payload::from(json!({"a": 1})).into_bytes();
        assert_eq!(&bytes[..], br#"{"a":1}"#);

        let bytes = Payload::from(json!([1, "two"])).into_bytes();
        assert_eq!(&bytes[..], br#"[1,"two"]"#);
    }

    #[test]
    fn test_text_is_not_quoted() {
        assert_eq!(&Payload::from("hello").into_bytes()[..], b"hello");
        assert_eq!(&Payload::from(json!("hello")).into_bytes()[..], b"hello");
    }

    #[test]
    fn test_scalars_use_string_form() {
        assert_eq!(&Payload::from(42).into_bytes()[..], b"42");
        assert_eq!(&Payload::from(-7i64).into_bytes()[..], b"-7");
        assert_eq!(&Payload::from(true).into_bytes()[..], b"true");
        assert_eq!(&Payload::from(2.5).into_bytes()[..], b"2.5");
        assert_eq!(&Payload::from('x').into_bytes()[..], b"x");
        assert_eq!(&Payload::from(json!(3.25)).into_bytes()[..], b"3.25");
    }

    #[test]
    fn test_whole_floats_keep_fraction() {
        assert_eq!(&Payload::from(1.0).into_bytes()[..], b"1.0");
        assert_eq!(&Payload::from(-20.0f32).into_bytes()[..], b"-20.0");
        assert_eq!(&Payload::from(f64::NAN).into_bytes()[..], b"NaN");
    }

    #[test]
    fn test_raw_bytes_pass_through() {
        let raw = vec![0u8, 159, 146, 150];
        assert_eq!(&Payload::from(raw.clone()).into_bytes()[..], &raw[..]);
    }

    #[test]
    fn test_buffer_is_not_copied() {
        let buffer = Bytes::from_static(b"\x01\x02\x03");
        let out = Payload::from(buffer.clone()).into_bytes();
        assert_eq!(out, buffer);
        assert_eq!(out.as_ptr(), buffer.as_ptr());
    }

    #[test]
    fn test_other_values_are_json() {
        assert_eq!(&Payload::from(Value::Null).into_bytes()[..], b"null");
        assert_eq!(&Payload::Other(json!("quoted")).into_bytes()[..], br#""quoted""#);
    }

    #[test]
    fn test_from_serialize_classifies_value() {
        #[derive(Serialize)]
        struct Reading {
            device: &'static str,
            temp: f64,
        }

        let payload = Payload::from_serialize(&Reading { device: "s-1", temp: 21.5 }).unwrap();
        assert!(matches!(payload, Payload::Structured(_)));
        let parsed: Value = serde_json::from_slice(&payload.into_bytes()).unwrap();
        assert_eq!(parsed["device"], "s-1");
        assert_eq!(parsed["temp"], 21.5);

        let payload = Payload::from_serialize("plain").unwrap();
        assert_eq!(payload, Payload::Text("plain".into()));
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let payload = Payload::from(json!({"b": [1, 2], "a": {"c": null}}));
        assert_eq!(payload.clone().into_bytes(), payload.into_bytes());
    }
}

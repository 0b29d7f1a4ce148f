//! Inbound protocol messages
//!
//! Every field decodes leniently: a value of the wrong JSON type reads as
//! absent, so one odd field never costs the rest of the message.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Server reconnect strategy carried in advice
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
    Retry,
    Handshake,
    None,
    /// Anything the server invents beyond the three known strategies
    #[serde(other)]
    Unknown,
}

/// Server-supplied timing and recovery hints
///
/// Numbers are kept as `f64` because the server is free to encode
/// integral millisecond values as floats.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Advice {
    #[serde(default, deserialize_with = "lenient")]
    pub reconnect: Option<Reconnect>,
    #[serde(default, deserialize_with = "lenient")]
    pub interval: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub timeout: Option<f64>,
}

impl Advice {
    /// Advised wait before reconnecting, in milliseconds
    pub fn interval_ms(&self) -> Option<u64> {
        self.interval.and_then(millis)
    }

    /// Advised connect timeout, in milliseconds
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout.and_then(millis)
    }

    /// True when the server asks for a fresh handshake
    pub fn wants_handshake(&self) -> bool {
        self.reconnect == Some(Reconnect::Handshake)
    }
}

fn millis(v: f64) -> Option<u64> {
    if v.is_finite() && v >= 0.0 {
        Some(v as u64)
    } else {
        None
    }
}

/// One decoded message from an inbound frame
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    #[serde(default, deserialize_with = "lenient_text")]
    pub channel: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub successful: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub client_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub subscription: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub advice: Option<Advice>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub error: Option<String>,
}

/// Decode a field, mapping a value of the wrong type to `None`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(lenient(deserializer)?.unwrap_or(false))
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_handshake_reply() {
        let msg: IncomingMessage = serde_json::from_value(json!({
            "channel": "/meta/handshake",
            "successful": true,
            "clientId": "abc123",
            "version": "1.0"
        }))
        .unwrap();
        assert!(msg.successful);
        assert_eq!(msg.client_id.as_deref(), Some("abc123"));
        assert!(msg.advice.is_none());
    }

    #[test]
    fn test_advice_handshake_with_float_interval() {
        let msg: IncomingMessage = serde_json::from_value(json!({
            "channel": "/meta/connect",
            "successful": false,
            "advice": {"reconnect": "handshake", "interval": 250.0}
        }))
        .unwrap();
        let advice = msg.advice.unwrap();
        assert!(advice.wants_handshake());
        assert_eq!(advice.interval_ms(), Some(250));
        assert_eq!(advice.timeout_ms(), None);
    }

    #[test]
    fn test_unknown_reconnect_strategy() {
        let advice: Advice = serde_json::from_value(json!({"reconnect": "teleport"})).unwrap();
        assert_eq!(advice.reconnect, Some(Reconnect::Unknown));
        assert!(!advice.wants_handshake());
    }

    #[test]
    fn test_negative_interval_ignored() {
        let advice: Advice = serde_json::from_value(json!({"interval": -5})).unwrap();
        assert_eq!(advice.interval_ms(), None);
    }

    #[test]
    fn test_missing_successful_defaults_false() {
        let msg: IncomingMessage =
            serde_json::from_value(json!({"channel": "/attendance/1/2/qr", "data": {"type": 1}}))
                .unwrap();
        assert!(!msg.successful);
        assert!(msg.data.is_some());
    }

    #[test]
    fn test_wrong_field_types_read_as_absent() {
        let msg: IncomingMessage = serde_json::from_value(json!({
            "channel": "/meta/connect",
            "successful": null,
            "clientId": 42,
            "error": {"code": 402},
            "advice": {"reconnect": 7, "interval": "250", "timeout": 20000}
        }))
        .unwrap();
        assert_eq!(msg.channel, "/meta/connect");
        assert!(!msg.successful);
        assert_eq!(msg.client_id, None);
        assert_eq!(msg.error, None);
        let advice = msg.advice.unwrap();
        assert_eq!(advice.reconnect, None);
        assert_eq!(advice.interval_ms(), None);
        assert_eq!(advice.timeout_ms(), Some(20000));
    }

    #[test]
    fn test_non_object_advice_and_channel() {
        let msg: IncomingMessage = serde_json::from_value(json!({
            "channel": ["/meta/handshake"],
            "successful": "true",
            "advice": "handshake"
        }))
        .unwrap();
        assert_eq!(msg.channel, "");
        assert!(!msg.successful);
        assert!(msg.advice.is_none());
    }
}

//! Outbound protocol envelopes

use serde::Serialize;

use crate::protocol::channel::{META_CONNECT, META_HANDSHAKE, META_SUBSCRIBE};
use crate::{BAYEUX_MINIMUM_VERSION, BAYEUX_VERSION, SUPPORTED_CONNECTION_TYPES};

/// Connection type announced on every connect envelope
const CONNECTION_TYPE: &str = "websocket";

/// One outbound protocol message
///
/// Envelopes are always sent inside a JSON array batch (see
/// [`FrameCodec::encode_batch`](crate::protocol::FrameCodec::encode_batch)).
/// Optional fields are omitted from the wire when absent.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub channel: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_connection_types: Option<Vec<String>>,

    /// String-encoded per-session sequence number
    pub id: String,
}

impl Envelope {
    fn bare(channel: &str, seq: u64) -> Self {
        Self {
            channel: channel.to_string(),
            client_id: None,
            subscription: None,
            connection_type: None,
            version: None,
            minimum_version: None,
            supported_connection_types: None,
            id: seq.to_string(),
        }
    }

    /// Create `/meta/handshake` envelope
    pub fn handshake(seq: u64) -> Self {
        Self {
            version: Some(BAYEUX_VERSION.to_string()),
            minimum_version: Some(BAYEUX_MINIMUM_VERSION.to_string()),
            supported_connection_types: Some(
                SUPPORTED_CONNECTION_TYPES.iter().map(|t| t.to_string()).collect(),
            ),
            ..Self::bare(META_HANDSHAKE, seq)
        }
    }

    /// Create `/meta/connect` envelope
    pub fn connect(client_id: &str, seq: u64) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            connection_type: Some(CONNECTION_TYPE.to_string()),
            ..Self::bare(META_CONNECT, seq)
        }
    }

    /// Create `/meta/subscribe` envelope for an application channel
    pub fn subscribe(client_id: &str, subscription: String, seq: u64) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            subscription: Some(subscription),
            ..Self::bare(META_SUBSCRIBE, seq)
        }
    }
}

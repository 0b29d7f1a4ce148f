//! JSON array codec for Bayeux frames

use serde_json::Value;
use tracing::warn;

use crate::error::{ClientError, Result};
use crate::types::{Envelope, IncomingMessage};

/// Maximum inbound frame size (16MB)
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Frame codec for serialization/deserialization
pub struct FrameCodec;

impl FrameCodec {
    /// Encode envelopes as one JSON array frame
    ///
    /// An empty slice produces `[]`, the heartbeat frame.
    pub fn encode_batch(envelopes: &[Envelope]) -> Result<String> {
        serde_json::to_string(envelopes).map_err(ClientError::from)
    }

    /// Decode an inbound frame into its ordered messages
    ///
    /// The frame must be a JSON array whose elements are all objects.
    /// An empty array is a valid heartbeat acknowledgment. An object that
    /// still fails to decode is skipped; its siblings are kept.
    pub fn decode(frame: &str) -> Result<Vec<IncomingMessage>> {
        if frame.len() > MAX_FRAME_SIZE {
            return Err(ClientError::FrameDecode(format!(
                "frame too large: {} bytes (max: {})",
                frame.len(),
                MAX_FRAME_SIZE
            )));
        }

        let value: Value = serde_json::from_str(frame)
            .map_err(|e| ClientError::FrameDecode(format!("invalid JSON: {}", e)))?;

        let Value::Array(items) = value else {
            return Err(ClientError::FrameDecode("frame is not an array".into()));
        };

        if let Some(i) = items.iter().position(|item| !item.is_object()) {
            return Err(ClientError::FrameDecode(format!(
                "element {} is not an object",
                i
            )));
        }

        Ok(items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match serde_json::from_value::<IncomingMessage>(item) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Skipping element {}: {}", i, e);
                    None
                }
            })
            .collect())
    }
}

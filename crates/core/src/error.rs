//! Error types for attendance-core

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// Initial socket establishment failed. Fatal to `open`, caller may retry.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single inbound frame could not be decoded into messages
    #[error("Frame decode error: {0}")]
    FrameDecode(String),

    /// Server replied with an error and no reconnect advice
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Not connected")]
    NotConnected,

    #[error("Client closed")]
    Closed,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::Closed;
        assert_eq!(err.to_string(), "Client closed");
    }

    #[test]
    fn test_serde_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ClientError = json_err.into();
        assert!(matches!(err, ClientError::Serialization(_)));
    }

    #[test]
    fn test_timeout_error() {
        let err = ClientError::Timeout(5000);
        assert_eq!(err.to_string(), "Timeout after 5000ms");
    }
}

//! Attendance Core - Bayeux push client for live attendance sessions
//!
//! This crate provides:
//! - Wire codec for Bayeux JSON array frames
//! - Session state machine (handshake, connect, rehandshake on advice)
//! - Subscription registry for the single course/sign target
//! - Heartbeat scheduling
//! - Dispatch of application payloads into typed domain events

// Protocol constants
pub const BAYEUX_VERSION: &str = "1.0";
pub const BAYEUX_MINIMUM_VERSION: &str = "1.0";
pub const SUPPORTED_CONNECTION_TYPES: [&str; 5] = [
    "websocket",
    "eventsource",
    "long-polling",
    "cross-origin-long-polling",
    "callback-polling",
];

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod protocol;
pub mod session;
pub mod subscription;
pub mod transport;
pub mod types;

// Re-export common types
pub use client::AttendanceClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use protocol::{ChannelTemplate, FrameCodec};
pub use session::Phase;
pub use subscription::SubscriptionTarget;
pub use types::{CodeRefresh, DomainEvent, Envelope, IncomingMessage, SubjectResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_constants_defined() {
        assert_eq!(BAYEUX_VERSION, "1.0");
        assert_eq!(SUPPORTED_CONNECTION_TYPES[0], "websocket");
    }
}

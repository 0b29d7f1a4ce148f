//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::protocol::ChannelTemplate;
use crate::{ClientError, Result};

pub const DEFAULT_ENDPOINT: &str = "wss://www.teachermate.com.cn/faye";
pub const DEFAULT_ORIGIN: &str = "https://www.teachermate.com.cn";
pub const DEFAULT_SUBPROTOCOL: &str = "bayeux";

/// Settings for [`AttendanceClient`](crate::AttendanceClient)
///
/// Every field has a default, so partial documents deserialize cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `ws://` or `wss://` endpoint
    pub endpoint: String,
    /// Origin header the server expects
    pub origin: String,
    /// Negotiated websocket sub-protocol
    pub subprotocol: String,
    /// Application channel shape, shared by subscribe and inbound matching
    pub channel_template: ChannelTemplate,
    /// How long to wait for a handshake reply before warning
    pub handshake_wait_ms: u64,
    /// Connect timeout assumed when the server gives no advice
    pub fallback_connect_timeout_ms: u64,
    /// Socket establishment timeout
    pub transport_connect_timeout_ms: u64,
    /// Buffered code-refresh events per receiver
    pub code_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            subprotocol: DEFAULT_SUBPROTOCOL.to_string(),
            channel_template: ChannelTemplate::default(),
            handshake_wait_ms: 5_000,
            fallback_connect_timeout_ms: 60_000,
            transport_connect_timeout_ms: 10_000,
            code_buffer: 16,
        }
    }
}

impl ClientConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_channel_template(mut self, template: ChannelTemplate) -> Self {
        self.channel_template = template;
        self
    }

    pub fn handshake_wait(&self) -> Duration {
        Duration::from_millis(self.handshake_wait_ms)
    }

    pub fn transport_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.transport_connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ClientError::InvalidConfig(format!(
                "endpoint must be ws:// or wss://, got {}",
                self.endpoint
            )));
        }
        if self.subprotocol.is_empty() {
            return Err(ClientError::InvalidConfig("subprotocol is empty".into()));
        }
        if self.code_buffer == 0 {
            return Err(ClientError::InvalidConfig("code_buffer must be > 0".into()));
        }
        Ok(())
    }
}

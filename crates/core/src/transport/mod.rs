//! WebSocket transport
//!
//! This module provides the socket side of the client:
//! - `wss://` connect with the Bayeux sub-protocol and the required Origin header
//! - A [`FrameSink`] seam so the engine can be driven without a real socket
//! - Heartbeat scheduling and reconnect advice helpers

pub mod heartbeat;
pub mod reconnect;

pub use heartbeat::{heartbeat_interval, Heartbeat};

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, ORIGIN, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::ClientConfig;
use crate::{ClientError, Result};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read half of an open socket
pub type WsSource = SplitStream<WsStream>;

/// Outbound frame writer
///
/// Implementations must serialize concurrent writers so frames never interleave.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Write one text frame
    async fn send_frame(&self, frame: String) -> Result<()>;

    /// Close the socket
    async fn close(&self) -> Result<()>;
}

/// Write half of an open socket
pub struct WsSink {
    inner: Mutex<SplitSink<WsStream, Message>>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&self, frame: String) -> Result<()> {
        let mut sink = self.inner.lock().await;
        sink.send(Message::Text(frame.into())).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut sink = self.inner.lock().await;
        sink.close().await?;
        Ok(())
    }
}

/// Open the socket described by `config`
///
/// Bounded by `config.transport_connect_timeout_ms`.
pub async fn connect(config: &ClientConfig) -> Result<(WsSink, WsSource)> {
    let mut request = config
        .endpoint
        .as_str()
        .into_client_request()
        .map_err(|e| ClientError::Connection(format!("Invalid endpoint {}: {}", config.endpoint, e)))?;

    let headers = request.headers_mut();
    headers.insert(
        ORIGIN,
        HeaderValue::from_str(&config.origin)
            .map_err(|e| ClientError::InvalidConfig(format!("origin: {}", e)))?,
    );
    headers.insert(
        SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_str(&config.subprotocol)
            .map_err(|e| ClientError::InvalidConfig(format!("subprotocol: {}", e)))?,
    );

    let timeout = config.transport_connect_timeout();
    let (ws, _response) = tokio::time::timeout(timeout, connect_async(request))
        .await
        .map_err(|_| ClientError::Timeout(timeout.as_millis() as u64))?
        .map_err(|e| ClientError::Connection(e.to_string()))?;

    tracing::info!("WebSocket connected to {}", config.endpoint);

    let (sink, source) = ws.split();
    Ok((
        WsSink {
            inner: Mutex::new(sink),
        },
        source,
    ))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::mpsc;

    /// Sink that records every frame into a channel
    pub struct RecordingSink {
        tx: mpsc::UnboundedSender<String>,
    }

    impl RecordingSink {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { tx }, rx)
        }
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send_frame(&self, frame: String) -> Result<()> {
            self.tx.send(frame).map_err(|_| ClientError::NotConnected)
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }
}

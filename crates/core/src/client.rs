//! Attendance push client
//!
//! Owns the socket, the session state and the background tasks:
//! - one reader task decoding frames and feeding the dispatcher
//! - one heartbeat task, started on the first successful connect
//! - a short-lived watcher per handshake that warns if no reply arrives
//!
//! All of them stop on the shared cancellation token and are joined by
//! [`AttendanceClient::close`]. A closed client cannot be reopened.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, Route};
use crate::events::{recv_within, EventSinks};
use crate::protocol::channel::{META_CONNECT, META_HANDSHAKE, META_SUBSCRIBE};
use crate::protocol::FrameCodec;
use crate::session::{Phase, SessionState};
use crate::subscription::{AttachDecision, SubscriptionTarget};
use crate::transport::{self, heartbeat, reconnect, FrameSink, Heartbeat, WsSource};
use crate::types::{CodeRefresh, Envelope, IncomingMessage, SubjectResult};
use crate::{ClientError, Result};

/// Raw frames are logged up to this many bytes
const FRAME_PREVIEW_BYTES: usize = 1024;

/// Long-lived Bayeux client for the attendance push channel
pub struct AttendanceClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    dispatcher: Dispatcher,
    session: Mutex<SessionState>,
    sink: Mutex<Option<Arc<dyn FrameSink>>>,
    events: EventSinks,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AttendanceClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let session = SessionState::new(
            config.channel_template.clone(),
            config.fallback_connect_timeout_ms,
        );
        Ok(Self {
            inner: Arc::new(Inner {
                dispatcher: Dispatcher::new(config.channel_template.clone()),
                events: EventSinks::new(config.code_buffer),
                session: Mutex::new(session),
                sink: Mutex::new(None),
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
                config,
            }),
        })
    }

    /// Open the socket, start the reader and send the handshake
    ///
    /// No-op if already open. Fails with [`ClientError::Connection`] (or
    /// `Timeout`) if the socket cannot be established, and with
    /// [`ClientError::Closed`] after [`close`](Self::close).
    pub async fn open(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return Err(ClientError::Closed);
        }

        let mut slot = inner.sink.lock().await;
        if slot.is_some() {
            debug!("Client already open");
            return Ok(());
        }
        let (sink, source) = transport::connect(&inner.config).await?;
        *slot = Some(Arc::new(sink));
        drop(slot);

        let reader = tokio::spawn(read_loop(Arc::clone(inner), source));
        inner.track(reader).await;

        inner.send_handshake().await?;
        info!("Handshake sent to {}", inner.config.endpoint);
        Ok(())
    }

    /// Request events for a course/sign pair
    ///
    /// Identical or non-positive targets are ignored. When not yet connected
    /// the target is recorded and subscribed after the next successful connect.
    pub async fn attach(&self, course_id: i64, sign_id: i64) {
        let (decision, envelope) = self.inner.session.lock().await.attach(course_id, sign_id);
        match decision {
            AttachDecision::Ignored => {
                debug!("Ignoring attach with non-positive ids {}/{}", course_id, sign_id)
            }
            AttachDecision::Unchanged => debug!("Already attached to {}/{}", course_id, sign_id),
            AttachDecision::Deferred(target) => {
                info!("Connect not complete, subscribe to {} deferred", target)
            }
            AttachDecision::SendNow(target) => info!("Subscribing to {}", target),
        }
        if let Some(envelope) = envelope {
            self.inner.send_logged(envelope).await;
        }
    }

    /// Stop all background tasks and close the socket
    ///
    /// Safe to call repeatedly and concurrently.
    pub async fn close(&self) {
        let inner = &self.inner;
        if !inner.cancel.is_cancelled() {
            info!("Closing client");
        }
        inner.cancel.cancel();

        let sink = inner.sink.lock().await.take();
        if let Some(sink) = sink {
            if let Err(e) = sink.close().await {
                debug!("Socket close: {}", e);
            }
        }
        inner.session.lock().await.mark_disconnected();

        let tasks = std::mem::take(&mut *inner.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }
    }

    /// Stream of freshly issued code URLs
    pub fn subscribe_code_refresh(&self) -> broadcast::Receiver<CodeRefresh> {
        self.inner.events.subscribe_codes()
    }

    /// Stream of subject results; only events emitted after this call are seen
    pub fn subscribe_results(&self) -> broadcast::Receiver<SubjectResult> {
        self.inner.events.subscribe_results()
    }

    /// Wait for the next subject result, or `None` after `timeout`
    pub async fn wait_result(&self, timeout: Duration) -> Option<SubjectResult> {
        let mut rx = self.subscribe_results();
        recv_within(&mut rx, timeout).await
    }

    pub async fn client_id(&self) -> Option<String> {
        self.inner.session.lock().await.client_id().map(str::to_string)
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.session.lock().await.is_connected()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.session.lock().await.phase()
    }

    pub async fn subscription(&self) -> Option<SubscriptionTarget> {
        self.inner.session.lock().await.subscription()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

impl Drop for AttendanceClient {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl Inner {
    async fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    async fn send(&self, envelopes: &[Envelope]) -> Result<()> {
        let frame = FrameCodec::encode_batch(envelopes)?;
        let sink = self.sink.lock().await.clone().ok_or(ClientError::NotConnected)?;
        sink.send_frame(frame).await
    }

    /// Send from a background path where failure is logged, not returned
    async fn send_logged(&self, envelope: Envelope) {
        let channel = envelope.channel.clone();
        if let Err(e) = self.send(&[envelope]).await {
            warn!("Failed to send {}: {}", channel, e);
        }
    }

    async fn send_handshake(&self) -> Result<()> {
        let (envelope, accepted) = self.session.lock().await.begin_handshake();
        let watcher = tokio::spawn(watch_handshake(
            accepted,
            self.config.handshake_wait(),
            self.cancel.clone(),
        ));
        self.track(watcher).await;
        self.send(&[envelope]).await
    }

    async fn handle_frame(self: &Arc<Self>, frame: &str) {
        debug!("Frame received ({}B): {}", frame.len(), preview(frame));

        let messages = match FrameCodec::decode(frame) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Dropping frame: {}", e);
                return;
            }
        };
        if messages.is_empty() {
            debug!("Heartbeat ack");
            return;
        }

        for message in messages {
            self.handle_message(message).await;
        }
    }

    async fn handle_message(self: &Arc<Self>, message: IncomingMessage) {
        match self.dispatcher.route(message) {
            Route::HandshakeAccepted { client_id } => {
                info!("Handshake ok, clientId={}", client_id);
                let connect = self.session.lock().await.on_handshake_ok(client_id);
                self.send_logged(connect).await;
            }
            Route::HandshakeRejected { error } => {
                warn!("{}", rejection(META_HANDSHAKE, error.as_deref()));
            }
            Route::ConnectAccepted { advice } => {
                let outcome = self.session.lock().await.on_connect_ok(advice.as_ref());
                debug!("Connect ok, timeout={}ms", outcome.timeout_ms);
                if let Some(interval) = outcome.start_heartbeat {
                    info!("Connected, timeout={}ms", outcome.timeout_ms);
                    self.start_heartbeat(interval).await;
                }
                if let Some(subscribe) = outcome.subscribe {
                    info!(
                        "Subscribing after connect: {}",
                        subscribe.subscription.as_deref().unwrap_or_default()
                    );
                    self.send_logged(subscribe).await;
                }
            }
            Route::Rehandshake { delay } => {
                self.session.lock().await.mark_reconnecting();
                info!("Unknown client, re-handshaking");
                if let Some(delay) = delay {
                    debug!("Reconnect advice interval {:?}", delay);
                    if !reconnect::wait_advised(delay, &self.cancel).await {
                        return;
                    }
                }
                if let Err(e) = self.send_handshake().await {
                    warn!("Re-handshake failed: {}", e);
                }
            }
            Route::ConnectRejected { error } => {
                warn!("{}", rejection(META_CONNECT, error.as_deref()));
            }
            Route::SubscribeAccepted { subscription } => {
                info!("Subscribe ack {}", subscription.as_deref().unwrap_or_default());
            }
            Route::SubscribeRejected { error } => {
                warn!("{}", rejection(META_SUBSCRIBE, error.as_deref()));
            }
            Route::Application { target, event } => match event {
                Some(event) => {
                    debug!("Application message on {}", target);
                    self.events.emit(event);
                }
                None => debug!("Unrecognized payload on {}", target),
            },
            Route::Ignored => debug!("Ignored message"),
        }
    }

    async fn start_heartbeat(self: &Arc<Self>, interval: Duration) {
        if self.cancel.is_cancelled() {
            return;
        }
        info!("Heartbeat every {:?}", interval);
        let inner = Arc::clone(self);
        let task = Heartbeat::new(interval).spawn(self.cancel.clone(), move || {
            let inner = Arc::clone(&inner);
            async move { inner.heartbeat_tick().await }
        });
        self.track(task).await;
    }

    async fn heartbeat_tick(&self) {
        let connect = self.session.lock().await.heartbeat_connect();
        let sink = self.sink.lock().await.clone();
        let Some(sink) = sink else {
            debug!("Heartbeat skipped, socket closed");
            return;
        };
        if let Err(e) = heartbeat::beat(sink.as_ref(), connect).await {
            warn!("Heartbeat send failed: {}", e);
        }
    }

    /// Reader ended on its own: drop the socket so `open` can start over
    async fn on_reader_terminated(&self) {
        self.sink.lock().await.take();
        self.session.lock().await.mark_disconnected();
    }
}

async fn read_loop(inner: Arc<Inner>, mut source: WsSource) {
    debug!("Reader started");
    loop {
        let next = tokio::select! {
            _ = inner.cancel.cancelled() => break,
            next = source.next() => next,
        };
        match next {
            Some(Ok(Message::Text(text))) => inner.handle_frame(text.as_str()).await,
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => inner.handle_frame(text).await,
                Err(_) => warn!("Dropping non-UTF-8 binary frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                info!("Server closed socket: {:?}", frame);
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                info!("Read error: {}", e);
                break;
            }
            None => {
                info!("Socket stream ended");
                break;
            }
        }
    }
    if !inner.cancel.is_cancelled() {
        inner.on_reader_terminated().await;
    }
    debug!("Reader exit");
}

async fn watch_handshake(accepted: oneshot::Receiver<()>, wait: Duration, cancel: CancellationToken) {
    tokio::select! {
        // Err means a newer handshake superseded this one
        result = accepted => {
            if result.is_ok() {
                debug!("Handshake success signal received");
            }
        }
        _ = tokio::time::sleep(wait) => warn!("Handshake timeout: no response within {:?}", wait),
        _ = cancel.cancelled() => {}
    }
}

/// Server refusal without reconnect advice; logged, never retried
fn rejection(channel: &str, error: Option<&str>) -> ClientError {
    ClientError::Protocol(format!(
        "{} rejected: {}",
        channel,
        error.unwrap_or("no error given")
    ))
}

fn preview(frame: &str) -> &str {
    if frame.len() <= FRAME_PREVIEW_BYTES {
        return frame;
    }
    let mut end = FRAME_PREVIEW_BYTES;
    while !frame.is_char_boundary(end) {
        end -= 1;
    }
    &frame[..end]
}

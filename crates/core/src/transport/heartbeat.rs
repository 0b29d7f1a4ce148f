//! Heartbeat scheduling for the Bayeux session
//!
//! After the first successful `/meta/connect`, the client re-asserts liveness
//! every half of the server-advised timeout: an empty `[]` frame followed by
//! a fresh connect envelope.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::FrameSink;
use crate::protocol::FrameCodec;
use crate::types::Envelope;
use crate::Result;

/// Tick interval for an advised connect timeout: `floor(timeout / 2)`, at least 1ms
pub fn heartbeat_interval(timeout_ms: u64) -> Duration {
    Duration::from_millis((timeout_ms / 2).max(1))
}

/// Send one heartbeat: `[]` then the connect envelope, if any
///
/// `connect` is `None` while the session holds no client id.
pub async fn beat(sink: &dyn FrameSink, connect: Option<Envelope>) -> Result<()> {
    sink.send_frame(FrameCodec::encode_batch(&[])?).await?;
    if let Some(env) = connect {
        sink.send_frame(FrameCodec::encode_batch(&[env])?).await?;
    }
    Ok(())
}

/// Periodic ticker bound to the session shutdown token
pub struct Heartbeat {
    interval: Duration,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Spawn heartbeat task
    ///
    /// The first tick fires one full interval after spawn. `tick` runs once
    /// per interval until `cancel` fires; it must log its own failures.
    pub fn spawn<F, Fut>(self, cancel: CancellationToken, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!("Heartbeat started, interval {:?}", self.interval);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => tick().await,
                }
            }

            tracing::debug!("Heartbeat stopped");
        })
    }
}

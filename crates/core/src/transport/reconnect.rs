//! Server-advised reconnection
//!
//! The client never reconnects on its own after a socket failure. The only
//! recovery path is a `/meta/connect` reply carrying `reconnect: handshake`
//! advice, answered by waiting the advised interval and handshaking again on
//! the still-open socket.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::types::Advice;

/// Delay to honor before rehandshaking; `None` or zero interval means go now
pub fn rehandshake_delay(advice: &Advice) -> Option<Duration> {
    advice
        .interval_ms()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Wait out the advised delay
///
/// Returns `false` if shutdown fired first.
pub async fn wait_advised(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = cancel.cancelled() => false,
    }
}

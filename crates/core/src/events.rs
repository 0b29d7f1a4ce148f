//! Event sinks
//!
//! Two broadcast streams. A receiver only observes events emitted after it
//! subscribed; with no receiver the event is dropped.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::types::{CodeRefresh, DomainEvent, SubjectResult};

/// At most one outstanding result per receiver; a burst keeps only the newest
const RESULT_CAPACITY: usize = 1;

pub struct EventSinks {
    codes: broadcast::Sender<CodeRefresh>,
    results: broadcast::Sender<SubjectResult>,
}

impl EventSinks {
    pub fn new(code_capacity: usize) -> Self {
        let (codes, _) = broadcast::channel(code_capacity.max(1));
        let (results, _) = broadcast::channel(RESULT_CAPACITY);
        Self { codes, results }
    }

    pub fn subscribe_codes(&self) -> broadcast::Receiver<CodeRefresh> {
        self.codes.subscribe()
    }

    pub fn subscribe_results(&self) -> broadcast::Receiver<SubjectResult> {
        self.results.subscribe()
    }

    /// Deliver an event without blocking
    ///
    /// Returns `true` if at least one receiver was listening.
    pub fn emit(&self, event: DomainEvent) -> bool {
        match event {
            DomainEvent::CodeRefresh(code) => {
                info!("Code refreshed: {}", code.url);
                self.codes.send(code).is_ok()
            }
            DomainEvent::SubjectResult(result) => {
                info!(
                    "Subject result: name={} number={} rank={} id={}",
                    result.name, result.external_number, result.rank, result.id
                );
                let delivered = self.results.send(result).is_ok();
                if !delivered {
                    debug!("No result receiver, dropping");
                }
                delivered
            }
        }
    }
}

/// Wait on a receiver, skipping over lag, until an event arrives or `timeout` passes
pub async fn recv_within<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    timeout: Duration,
) -> Option<T> {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Receiver lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    };
    tokio::time::timeout(timeout, wait).await.ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: i64) -> DomainEvent {
        DomainEvent::SubjectResult(SubjectResult {
            id,
            name: "A".into(),
            external_number: "007".into(),
            rank: 3,
        })
    }

    #[tokio::test]
    async fn test_result_dropped_without_receiver() {
        let sinks = EventSinks::new(4);
        assert!(!sinks.emit(result(1)));

        let mut rx = sinks.subscribe_results();
        assert_eq!(recv_within(&mut rx, Duration::from_millis(50)).await, None);
    }

    #[tokio::test]
    async fn test_result_delivered_to_waiting_receiver() {
        let sinks = EventSinks::new(4);
        let mut rx = sinks.subscribe_results();
        assert!(sinks.emit(result(99)));
        let got = recv_within(&mut rx, Duration::from_millis(50)).await.unwrap();
        assert_eq!(got.id, 99);
    }

    #[tokio::test]
    async fn test_result_burst_keeps_newest() {
        let sinks = EventSinks::new(4);
        let mut rx = sinks.subscribe_results();
        sinks.emit(result(1));
        sinks.emit(result(2));
        let got = recv_within(&mut rx, Duration::from_millis(50)).await.unwrap();
        assert_eq!(got.id, 2);
    }

    #[tokio::test]
    async fn test_code_refresh_not_deduplicated() {
        let sinks = EventSinks::new(4);
        let mut rx = sinks.subscribe_codes();
        let code = DomainEvent::CodeRefresh(CodeRefresh { url: "https://x/y".into() });
        sinks.emit(code.clone());
        sinks.emit(code);
        assert_eq!(rx.recv().await.unwrap().url, "https://x/y");
        assert_eq!(rx.recv().await.unwrap().url, "https://x/y");
    }
}

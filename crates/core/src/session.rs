//! Session state machine
//!
//! Owns client identity, the sequence counter and the subscription registry.
//! Every transition returns the envelopes to send; the caller releases the
//! session lock before writing them to the socket.

use std::time::Duration;
use tokio::sync::oneshot;

use crate::protocol::ChannelTemplate;
use crate::subscription::{AttachDecision, SubscriptionRegistry, SubscriptionTarget};
use crate::transport::heartbeat::heartbeat_interval;
use crate::types::{Advice, Envelope};

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Handshaking,
    Connected,
    /// Server advised a fresh handshake; client id dropped
    Reconnecting,
}

/// Result of a successful `/meta/connect` reply
#[derive(Debug, Default)]
pub struct ConnectOutcome {
    /// Server-advised (or fallback) connect timeout
    pub timeout_ms: u64,
    /// Set only on the first successful connect of the session
    pub start_heartbeat: Option<Duration>,
    /// Deferred subscribe, if a target was waiting
    pub subscribe: Option<Envelope>,
}

#[derive(Debug)]
pub struct SessionState {
    template: ChannelTemplate,
    fallback_timeout_ms: u64,
    client_id: Option<String>,
    phase: Phase,
    seq: u64,
    subscriptions: SubscriptionRegistry,
    heartbeat_started: bool,
    pending_handshake: Option<oneshot::Sender<()>>,
}

impl SessionState {
    pub fn new(template: ChannelTemplate, fallback_timeout_ms: u64) -> Self {
        Self {
            template,
            fallback_timeout_ms,
            client_id: None,
            phase: Phase::Disconnected,
            seq: 0,
            subscriptions: SubscriptionRegistry::new(),
            heartbeat_started: false,
            pending_handshake: None,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn subscribe_envelope(&mut self, client_id: &str, target: SubscriptionTarget) -> Envelope {
        let channel = self.template.render(target);
        let seq = self.next_seq();
        Envelope::subscribe(client_id, channel, seq)
    }

    /// Start (or restart) a handshake
    ///
    /// Returns the handshake envelope and a receiver that resolves when the
    /// server accepts it. A previous pending receiver is dropped.
    pub fn begin_handshake(&mut self) -> (Envelope, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        self.pending_handshake = Some(tx);
        self.phase = Phase::Handshaking;
        let seq = self.next_seq();
        (Envelope::handshake(seq), rx)
    }

    /// Store the server-assigned client id and produce the first connect
    pub fn on_handshake_ok(&mut self, client_id: String) -> Envelope {
        if let Some(tx) = self.pending_handshake.take() {
            let _ = tx.send(());
        }
        let seq = self.next_seq();
        let env = Envelope::connect(&client_id, seq);
        self.client_id = Some(client_id);
        env
    }

    pub fn on_connect_ok(&mut self, advice: Option<&Advice>) -> ConnectOutcome {
        let timeout_ms = advice
            .and_then(Advice::timeout_ms)
            .unwrap_or(self.fallback_timeout_ms);

        let mut outcome = ConnectOutcome {
            timeout_ms,
            ..Default::default()
        };

        let Some(client_id) = self.client_id.clone() else {
            // Stale reply for a client id we already dropped
            return outcome;
        };

        if !self.heartbeat_started {
            self.heartbeat_started = true;
            outcome.start_heartbeat = Some(heartbeat_interval(timeout_ms));
        }
        self.phase = Phase::Connected;

        if let Some(target) = self.subscriptions.take_pending() {
            outcome.subscribe = Some(self.subscribe_envelope(&client_id, target));
        }
        outcome
    }

    /// Drop identity after `reconnect: handshake` advice
    ///
    /// The subscription target survives and is resent after the next connect.
    pub fn mark_reconnecting(&mut self) {
        self.client_id = None;
        self.phase = Phase::Reconnecting;
        self.subscriptions.reset_delivery();
    }

    /// Record an attach request; returns the subscribe envelope when it should go out now
    pub fn attach(&mut self, course_id: i64, sign_id: i64) -> (AttachDecision, Option<Envelope>) {
        let ready = self.is_connected();
        let decision = self.subscriptions.request(course_id, sign_id, ready);
        let envelope = match (decision, self.client_id.clone()) {
            (AttachDecision::SendNow(target), Some(client_id)) => {
                Some(self.subscribe_envelope(&client_id, target))
            }
            _ => None,
        };
        (decision, envelope)
    }

    /// Connect envelope for a heartbeat tick; `None` while no client id is held
    pub fn heartbeat_connect(&mut self) -> Option<Envelope> {
        let client_id = self.client_id.clone()?;
        let seq = self.next_seq();
        Some(Envelope::connect(&client_id, seq))
    }

    /// Socket went away
    pub fn mark_disconnected(&mut self) {
        self.client_id = None;
        self.phase = Phase::Disconnected;
        self.pending_handshake = None;
        self.subscriptions.reset_delivery();
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Connected && self.client_id.is_some()
    }

    pub fn subscription(&self) -> Option<SubscriptionTarget> {
        self.subscriptions.target()
    }

    /// Last sequence number handed out
    pub fn last_seq(&self) -> u64 {
        self.seq
    }
}

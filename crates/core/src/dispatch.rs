//! Message classification
//!
//! Maps each decoded message to a [`Route`]. Application-channel payloads are
//! recognized before the success flag is looked at, since the server
//! publishes them without the meta-reply `successful` semantics.

use std::time::Duration;

use crate::protocol::{ChannelTemplate, MetaChannel};
use crate::subscription::SubscriptionTarget;
use crate::transport::reconnect::rehandshake_delay;
use crate::types::{Advice, DomainEvent, IncomingMessage};

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    HandshakeAccepted { client_id: String },
    HandshakeRejected { error: Option<String> },
    ConnectAccepted { advice: Option<Advice> },
    /// `reconnect: handshake` advice on a failed connect
    Rehandshake { delay: Option<Duration> },
    /// Failed connect without handshake advice
    ConnectRejected { error: Option<String> },
    SubscribeAccepted { subscription: Option<String> },
    SubscribeRejected { error: Option<String> },
    Application {
        target: SubscriptionTarget,
        event: Option<DomainEvent>,
    },
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    template: ChannelTemplate,
}

impl Dispatcher {
    pub fn new(template: ChannelTemplate) -> Self {
        Self { template }
    }

    pub fn route(&self, msg: IncomingMessage) -> Route {
        if let Some(target) = self.template.matches(&msg.channel) {
            let event = msg.data.as_ref().and_then(DomainEvent::from_payload);
            return Route::Application { target, event };
        }

        let Some(meta) = MetaChannel::parse(&msg.channel) else {
            return Route::Ignored;
        };

        match (meta, msg.successful) {
            (MetaChannel::Handshake, true) => match msg.client_id {
                Some(client_id) if !client_id.is_empty() => Route::HandshakeAccepted { client_id },
                _ => Route::Ignored,
            },
            (MetaChannel::Handshake, false) => Route::HandshakeRejected { error: msg.error },
            (MetaChannel::Connect, true) => Route::ConnectAccepted { advice: msg.advice },
            (MetaChannel::Connect, false) => match msg.advice {
                Some(advice) if advice.wants_handshake() => Route::Rehandshake {
                    delay: rehandshake_delay(&advice),
                },
                _ => Route::ConnectRejected { error: msg.error },
            },
            (MetaChannel::Subscribe, true) => Route::SubscribeAccepted {
                subscription: msg.subscription,
            },
            (MetaChannel::Subscribe, false) => Route::SubscribeRejected { error: msg.error },
        }
    }
}

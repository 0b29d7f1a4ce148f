//! Subscription registry
//!
//! Holds the single course/sign pair the client wants events for and
//! decides whether a new request is sent now, deferred until the next
//! successful connect, or ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Course/sign pair identifying one application channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionTarget {
    pub course_id: u64,
    pub sign_id: u64,
}

impl SubscriptionTarget {
    /// Build a target from caller-supplied ids; non-positive ids yield `None`
    pub fn new(course_id: i64, sign_id: i64) -> Option<Self> {
        if course_id <= 0 || sign_id <= 0 {
            return None;
        }
        Some(Self {
            course_id: course_id as u64,
            sign_id: sign_id as u64,
        })
    }
}

impl fmt::Display for SubscriptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.course_id, self.sign_id)
    }
}

/// Outcome of an attach request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachDecision {
    /// Non-positive ids; nothing recorded
    Ignored,
    /// Same target already recorded
    Unchanged,
    /// Session is ready, subscribe immediately
    SendNow(SubscriptionTarget),
    /// Recorded, subscribe on next successful connect
    Deferred(SubscriptionTarget),
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    target: Option<SubscriptionTarget>,
    /// Whether a subscribe envelope went out for `target` under the current client id
    delivered: bool,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<SubscriptionTarget> {
        self.target
    }

    /// Record a requested target
    ///
    /// `ready` is true when the session is connected and holds a client id.
    pub fn request(&mut self, course_id: i64, sign_id: i64, ready: bool) -> AttachDecision {
        let Some(target) = SubscriptionTarget::new(course_id, sign_id) else {
            return AttachDecision::Ignored;
        };
        if self.target == Some(target) {
            return AttachDecision::Unchanged;
        }

        self.target = Some(target);
        self.delivered = ready;
        if ready {
            AttachDecision::SendNow(target)
        } else {
            AttachDecision::Deferred(target)
        }
    }

    /// Claim the recorded target for sending after a successful connect
    ///
    /// Returns it at most once per client id.
    pub fn take_pending(&mut self) -> Option<SubscriptionTarget> {
        match self.target {
            Some(target) if !self.delivered => {
                self.delivered = true;
                Some(target)
            }
            _ => None,
        }
    }

    /// Forget delivery after the server drops our client id; the target is kept
    pub fn reset_delivery(&mut self) {
        self.delivered = false;
    }
}

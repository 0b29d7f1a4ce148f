//! Channel names and the application channel template

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::subscription::SubscriptionTarget;
use crate::{ClientError, Result};

pub const META_HANDSHAKE: &str = "/meta/handshake";
pub const META_CONNECT: &str = "/meta/connect";
pub const META_SUBSCRIBE: &str = "/meta/subscribe";

const COURSE_PLACEHOLDER: &str = "{course}";
const SIGN_PLACEHOLDER: &str = "{sign}";

/// Reserved lifecycle channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaChannel {
    Handshake,
    Connect,
    Subscribe,
}

impl MetaChannel {
    pub fn parse(channel: &str) -> Option<Self> {
        match channel {
            META_HANDSHAKE => Some(Self::Handshake),
            META_CONNECT => Some(Self::Connect),
            META_SUBSCRIBE => Some(Self::Subscribe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Course,
    Sign,
}

/// Application channel shape, e.g. `/attendance/{course}/{sign}/qr`
///
/// The same template renders the subscribe request and recognizes inbound
/// channels, so the two can never drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl ChannelTemplate {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = raw;
        let (mut courses, mut signs) = (0, 0);

        while !rest.is_empty() {
            let next = [COURSE_PLACEHOLDER, SIGN_PLACEHOLDER]
                .iter()
                .filter_map(|p| rest.find(p).map(|idx| (idx, *p)))
                .min_by_key(|(idx, _)| *idx);

            match next {
                Some((idx, placeholder)) => {
                    if idx > 0 {
                        segments.push(Segment::Literal(rest[..idx].to_string()));
                    } else if matches!(segments.last(), Some(Segment::Course | Segment::Sign)) {
                        return Err(ClientError::InvalidConfig(format!(
                            "channel template {raw:?} has adjacent placeholders"
                        )));
                    }
                    if placeholder == COURSE_PLACEHOLDER {
                        courses += 1;
                        segments.push(Segment::Course);
                    } else {
                        signs += 1;
                        segments.push(Segment::Sign);
                    }
                    rest = &rest[idx + placeholder.len()..];
                }
                None => {
                    segments.push(Segment::Literal(rest.to_string()));
                    rest = "";
                }
            }
        }

        // Placeholders match greedily, so a digit right after one could never match
        let digit_follows = segments.windows(2).any(|pair| match pair {
            [Segment::Course | Segment::Sign, Segment::Literal(lit)] => {
                lit.starts_with(|c: char| c.is_ascii_digit())
            }
            _ => false,
        });
        if digit_follows {
            return Err(ClientError::InvalidConfig(format!(
                "channel template {raw:?} has a digit right after a placeholder"
            )));
        }

        if courses != 1 || signs != 1 {
            return Err(ClientError::InvalidConfig(format!(
                "channel template {raw:?} must contain {COURSE_PLACEHOLDER} and {SIGN_PLACEHOLDER} exactly once"
            )));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Render the channel for a target
    pub fn render(&self, target: SubscriptionTarget) -> String {
        let mut out = String::with_capacity(self.raw.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Course => out.push_str(&target.course_id.to_string()),
                Segment::Sign => out.push_str(&target.sign_id.to_string()),
            }
        }
        out
    }

    /// Recognize an inbound channel and extract its embedded identifiers
    ///
    /// Only the canonical rendering matches; `/attendance/007/42/qr` does not.
    pub fn matches(&self, channel: &str) -> Option<SubscriptionTarget> {
        let mut rest = channel;
        let (mut course, mut sign) = (None, None);

        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => rest = rest.strip_prefix(s.as_str())?,
                Segment::Course | Segment::Sign => {
                    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
                    if digits == 0 {
                        return None;
                    }
                    let value: u64 = rest[..digits].parse().ok()?;
                    rest = &rest[digits..];
                    if *segment == Segment::Course {
                        course = Some(value);
                    } else {
                        sign = Some(value);
                    }
                }
            }
        }

        if !rest.is_empty() {
            return None;
        }
        let target = SubscriptionTarget {
            course_id: course?,
            sign_id: sign?,
        };
        (self.render(target) == channel).then_some(target)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Default for ChannelTemplate {
    fn default() -> Self {
        Self {
            raw: "/attendance/{course}/{sign}/qr".to_string(),
            segments: vec![
                Segment::Literal("/attendance/".to_string()),
                Segment::Course,
                Segment::Literal("/".to_string()),
                Segment::Sign,
                Segment::Literal("/qr".to_string()),
            ],
        }
    }
}

impl TryFrom<String> for ChannelTemplate {
    type Error = ClientError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<ChannelTemplate> for String {
    fn from(template: ChannelTemplate) -> Self {
        template.raw
    }
}

impl fmt::Display for ChannelTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

//! Protocol and domain types

mod envelope;
mod event;
mod message;

pub use envelope::Envelope;
pub use event::{CodeRefresh, DomainEvent, PayloadKind, SubjectResult};
pub use message::{Advice, IncomingMessage, Reconnect};

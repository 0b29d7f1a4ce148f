//! Bayeux wire protocol: channel names and JSON frame codec

pub mod channel;
pub mod codec;

pub use channel::{ChannelTemplate, MetaChannel};
pub use codec::FrameCodec;

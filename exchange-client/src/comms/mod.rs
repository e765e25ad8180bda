//! Wire-level plumbing: framing, message schema, request correlation and the
//! per-channel socket link.

pub mod connection;
pub mod correlator;
pub mod frame;
pub mod messages;
pub mod packet;

pub use connection::ChannelLink;
pub use correlator::RequestCorrelator;
pub use frame::{Envelope, FrameCodec};
pub use packet::{Message, MessageType, RawMessage};

use std::fmt;

/// The two independent connections a session holds to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Public market data and instrument lifecycle.
    Info,
    /// Order entry and private fills.
    Execution,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Info => f.write_str("info"),
            ChannelKind::Execution => f.write_str("exec"),
        }
    }
}

use crate::comms::frame::{MAX_FRAME_BYTES, MAX_SEGMENTS};
use crate::comms::packet::MessageType;
use crate::comms::ChannelKind;
use exchange::InstrumentId;
use std::time::Duration;
use thiserror::Error;

/// Failure to cut a well-formed envelope out of the byte stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The stream ended before a complete envelope was read.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("envelope has no segments")]
    NoSegments,

    #[error("envelope declares {0} segments (max {max})", max = MAX_SEGMENTS)]
    TooManySegments(u64),

    #[error("envelope payload of {0} bytes exceeds the {max} byte limit", max = MAX_FRAME_BYTES)]
    FrameTooLarge(u64),

    #[error("payload is {actual} bytes but segment sizes declare {declared}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => FrameError::ConnectionClosed,
            _ => FrameError::Io(err.to_string()),
        }
    }
}

/// The server broke the protocol contract. Never retried: the session is torn down.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("got reply for unknown request id {0}")]
    UnknownRequestId(u64),

    #[error("request id {0} is already pending")]
    DuplicateRequestId(u64),

    #[error("unknown message type {0} from server")]
    UnknownMessageType(u16),

    #[error("unexpected {message_type:?} message on the {channel} channel")]
    UnexpectedMessage {
        channel: ChannelKind,
        message_type: MessageType,
    },

    #[error("unknown trade side: '{0}'")]
    UnknownSide(String),

    #[error("unknown action: '{0}'")]
    UnknownAction(String),

    #[error("lifecycle event for unknown instrument '{0}'")]
    UnknownInstrument(InstrumentId),

    #[error("malformed message: {0}")]
    Malformed(String),
}

impl From<bincode::Error> for ProtocolError {
    fn from(err: bincode::Error) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}

/// Global error type of the exchange client.
///
/// `Clone` so that a single connection failure can be handed to every caller
/// that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("not connected; call connect() first")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("unable to connect to the exchange within {0:?}")]
    ConnectionTimeout(Duration),

    #[error("reactor did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    /// The connection went away while the call was in flight.
    #[error("disconnected from the exchange")]
    Disconnected,

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("no PnL available: no valuation or last traded price for '{instrument_id}' (position {volume})")]
    NoPnlAvailable {
        instrument_id: InstrumentId,
        volume: i64,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("framing error: {0}")]
    Framing(#[from] FrameError),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    /// Whether this error ends the session (as opposed to a rejected request).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Disconnected
                | ClientError::Transport(_)
                | ClientError::Framing(_)
                | ClientError::Protocol(_)
        )
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// A specialized Result type for exchange client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

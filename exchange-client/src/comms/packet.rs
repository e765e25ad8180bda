//! Message schema carried inside an [`Envelope`].
//!
//! An envelope holds a single segment containing a bincode-encoded
//! [`RawMessage`]: a `u16` type tag followed by the bincode-encoded body for that
//! tag. Decoding rejects tags outside the closed [`MessageType`] set.

use crate::comms::frame::Envelope;
use crate::comms::messages::*;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// Tag plus undecoded body, as found in an envelope's first segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub msg_type: u16,
    pub body: Vec<u8>,
}

impl RawMessage {
    pub fn from_envelope(envelope: &Envelope) -> std::result::Result<Self, ProtocolError> {
        let segment = envelope
            .segment(0)
            .ok_or_else(|| ProtocolError::Malformed("empty envelope".into()))?;
        // Trailing word padding is ignored by bincode.
        Ok(bincode::deserialize(segment)?)
    }

    /// Fails with [`FrameError::FrameTooLarge`](crate::FrameError::FrameTooLarge)
    /// when the encoded message does not fit in one envelope.
    pub fn to_envelope(&self) -> Result<Envelope> {
        let bytes = bincode::serialize(self).map_err(ProtocolError::from)?;
        Ok(Envelope::single(&bytes)?)
    }
}

macro_rules! wire_messages {
    ($($variant:ident($body:ty) = $tag:literal),+ $(,)?) => {
        /// Closed set of message types known to this client.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum MessageType {
            $($variant = $tag),+
        }

        impl TryFrom<u16> for MessageType {
            type Error = ProtocolError;

            fn try_from(tag: u16) -> std::result::Result<Self, Self::Error> {
                match tag {
                    $($tag => Ok(MessageType::$variant),)+
                    other => Err(ProtocolError::UnknownMessageType(other)),
                }
            }
        }

        /// A decoded message of any known type.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $($variant($body)),+
        }

        impl Message {
            pub fn message_type(&self) -> MessageType {
                match self {
                    $(Message::$variant(_) => MessageType::$variant),+
                }
            }

            fn encode_body(&self) -> bincode::Result<Vec<u8>> {
                match self {
                    $(Message::$variant(body) => bincode::serialize(body)),+
                }
            }

            fn decode_body(msg_type: MessageType, body: &[u8]) -> bincode::Result<Self> {
                match msg_type {
                    $(MessageType::$variant => bincode::deserialize(body).map(Message::$variant)),+
                }
            }
        }
    };
}

wire_messages! {
    GenericReply(GenericReply) = 1,

    InfoSubscribe(InfoSubscribe) = 10,
    Login(Login) = 11,
    InsertOrder(InsertOrder) = 12,
    AmendOrder(AmendOrder) = 13,
    DeleteOrder(DeleteOrder) = 14,
    DeleteOrders(DeleteOrders) = 15,
    UpdateInstrumentParameters(UpdateInstrumentParameters) = 16,

    PriceBook(PriceBookUpdate) = 20,
    TradeTick(TradeTickUpdate) = 21,
    InstrumentCreated(InstrumentCreated) = 22,
    InstrumentExpired(InstrumentEvent) = 23,
    InstrumentPaused(InstrumentEvent) = 24,
    InstrumentResumed(InstrumentEvent) = 25,
    InstrumentParametersUpdated(InstrumentParametersUpdated) = 26,
    InstrumentStartupData(InstrumentStartupData) = 27,

    OrderUpdate(OrderUpdate) = 30,
    PrivateTrade(PrivateTrade) = 31,
    SingleSidedBooking(Booking) = 32,
    ForcedDisconnect(ForcedDisconnect) = 33,
    Notification(Notification) = 34,
    Ping(Ping) = 35,
}

impl Message {
    pub fn encode(&self) -> Result<Envelope> {
        RawMessage {
            msg_type: self.message_type() as u16,
            body: self.encode_body().map_err(ProtocolError::from)?,
        }
        .to_envelope()
    }

    pub fn decode(envelope: &Envelope) -> std::result::Result<Self, ProtocolError> {
        let raw = RawMessage::from_envelope(envelope)?;
        let msg_type = MessageType::try_from(raw.msg_type)?;
        Ok(Self::decode_body(msg_type, &raw.body)?)
    }

    /// Request id of a request or reply, `None` for pushes.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Message::GenericReply(m) => Some(m.request_id),
            Message::InfoSubscribe(m) => Some(m.request_id),
            Message::Login(m) => Some(m.request_id),
            Message::InsertOrder(m) => Some(m.request_id),
            Message::AmendOrder(m) => Some(m.request_id),
            Message::DeleteOrder(m) => Some(m.request_id),
            Message::DeleteOrders(m) => Some(m.request_id),
            Message::UpdateInstrumentParameters(m) => Some(m.request_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_survives_envelope() {
        let message = Message::InsertOrder(InsertOrder {
            request_id: 3,
            instrument_id: "ASML".into(),
            price: 99.5,
            volume: 10,
            side: "bid".into(),
            order_type: "limit".into(),
        });

        let envelope = message.encode().unwrap();
        assert_eq!(envelope.segment_count(), 1);
        assert_eq!(envelope.payload().len() % 8, 0);
        assert_eq!(Message::decode(&envelope).unwrap(), message);
        assert_eq!(message.request_id(), Some(3));
    }

    #[test]
    fn test_reply_bodies() {
        for body in [
            ReplyBody::Ack,
            ReplyBody::OrderInserted { order_id: 12 },
            ReplyBody::Success(false),
            ReplyBody::Rejected {
                reason: "no such instrument".into(),
            },
            ReplyBody::LoggedIn {
                positions: vec![WirePosition::new("ASML", -3, 300.0)],
            },
        ] {
            let message = Message::GenericReply(GenericReply::new(1, body));
            assert_eq!(Message::decode(&message.encode().unwrap()).unwrap(), message);
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let envelope = RawMessage {
            msg_type: 999,
            body: vec![],
        }
        .to_envelope()
        .unwrap();

        assert_eq!(
            Message::decode(&envelope),
            Err(ProtocolError::UnknownMessageType(999))
        );
    }

    #[test]
    fn test_truncated_body_is_malformed() {
        let envelope = RawMessage {
            msg_type: MessageType::PrivateTrade as u16,
            body: vec![1, 2, 3],
        }
        .to_envelope()
        .unwrap();

        assert!(matches!(
            Message::decode(&envelope),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_pushes_have_no_request_id() {
        assert_eq!(Message::Ping(Ping).request_id(), None);
        assert_eq!(
            MessageType::try_from(MessageType::Ping as u16),
            Ok(MessageType::Ping)
        );
    }
}

//! Routes pushed messages to the state they update.
//!
//! Each channel accepts a fixed set of push types. Anything else, including a
//! request or a push meant for the other channel, is a protocol violation and
//! ends the session.

use crate::comms::packet::Message;
use crate::comms::ChannelKind;
use crate::error::ProtocolError;
use crate::state::ClientState;
use chrono::Utc;
use log::error;

pub fn dispatch(state: &mut ClientState, channel: ChannelKind, message: Message) -> Result<(), ProtocolError> {
    match (channel, message) {
        (_, Message::Ping(_)) => {}

        (ChannelKind::Info, Message::PriceBook(update)) => {
            state.info.apply_price_book(update.to_price_book(Utc::now()));
        }
        (ChannelKind::Info, Message::TradeTick(update)) => {
            state.info.apply_trade_tick(update.to_trade_tick()?);
        }
        (ChannelKind::Info, Message::InstrumentCreated(created)) => {
            state.info.instruments.create(created.to_instrument()?);
        }
        (ChannelKind::Info, Message::InstrumentExpired(event)) => {
            state.info.instruments.expire(&event.instrument_id)?;
        }
        (ChannelKind::Info, Message::InstrumentPaused(event)) => {
            state.info.instruments.pause(&event.instrument_id)?;
        }
        (ChannelKind::Info, Message::InstrumentResumed(event)) => {
            state.info.instruments.resume(&event.instrument_id)?;
        }
        (ChannelKind::Info, Message::InstrumentParametersUpdated(update)) => {
            state
                .info
                .instruments
                .update_parameters(&update.instrument_id, &update.parameters)?;
        }
        (ChannelKind::Info, Message::InstrumentStartupData(data)) => {
            state
                .info
                .seed_last_traded(&data.instrument_id, data.last_traded_price);
        }

        (ChannelKind::Execution, Message::OrderUpdate(update)) => {
            state.exec.apply_order_update(update.to_order_status()?);
        }
        (ChannelKind::Execution, Message::PrivateTrade(trade)) => {
            state.exec.apply_trade(trade.to_trade()?);
        }
        (ChannelKind::Execution, Message::SingleSidedBooking(booking)) => {
            state.exec.apply_booking(booking.to_booking()?);
        }
        (ChannelKind::Execution, Message::ForcedDisconnect(notice)) => {
            error!("Forcefully disconnected by the exchange: {}", notice.reason);
        }
        (ChannelKind::Execution, Message::Notification(notice)) => {
            error!("Message from {}: {}", notice.source, notice.message);
        }

        (channel, other) => {
            return Err(ProtocolError::UnexpectedMessage {
                channel,
                message_type: other.message_type(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::messages::*;
    use crate::comms::packet::MessageType;
    use exchange::{Instrument, PositionEntry};

    fn state() -> ClientState {
        ClientState::new(100)
    }

    fn fill(side: &str) -> Message {
        Message::PrivateTrade(PrivateTrade {
            order_id: 1,
            instrument_id: "ASML".into(),
            price: 100.0,
            volume: 5,
            side: side.into(),
        })
    }

    #[test]
    fn test_fill_updates_position() {
        let mut state = state();
        dispatch(&mut state, ChannelKind::Execution, fill("bid")).unwrap();

        assert_eq!(
            state.exec.ledger.position("ASML"),
            Some(PositionEntry::new(5, -500.0))
        );
        assert_eq!(state.exec.trades.history("ASML").len(), 1);
    }

    #[test]
    fn test_unknown_side_leaves_ledger_untouched() {
        let mut state = state();
        assert_eq!(
            dispatch(&mut state, ChannelKind::Execution, fill("sideways")),
            Err(ProtocolError::UnknownSide("sideways".into()))
        );
        assert_eq!(state.exec.ledger.position("ASML"), None);
    }

    #[test]
    fn test_push_on_wrong_channel() {
        let mut state = state();
        assert_eq!(
            dispatch(&mut state, ChannelKind::Info, fill("bid")),
            Err(ProtocolError::UnexpectedMessage {
                channel: ChannelKind::Info,
                message_type: MessageType::PrivateTrade,
            })
        );

        let book = Message::PriceBook(PriceBookUpdate {
            instrument_id: "ASML".into(),
            bids: vec![],
            asks: vec![],
        });
        assert!(dispatch(&mut state, ChannelKind::Execution, book).is_err());
    }

    #[test]
    fn test_empty_book_is_stored() {
        let mut state = state();
        let book = Message::PriceBook(PriceBookUpdate {
            instrument_id: "ASML".into(),
            bids: vec![],
            asks: vec![],
        });
        dispatch(&mut state, ChannelKind::Info, book).unwrap();

        let stored = &state.info.books["ASML"];
        assert!(stored.is_empty());
    }

    #[test]
    fn test_trade_ticks_set_last_traded_price() {
        let mut state = state();
        dispatch(
            &mut state,
            ChannelKind::Info,
            Message::InstrumentStartupData(InstrumentStartupData {
                instrument_id: "ASML".into(),
                last_traded_price: 98.0,
            }),
        )
        .unwrap();
        assert_eq!(state.info.last_traded["ASML"], 98.0);

        let tick = Message::TradeTick(TradeTickUpdate {
            instrument_id: "ASML".into(),
            price: 99.5,
            volume: 1,
            aggressor_side: "bid".into(),
            buyer: "bob".into(),
            seller: "alice".into(),
            trade_id: 1,
            timestamp_ns: 0,
        });
        dispatch(&mut state, ChannelKind::Info, tick).unwrap();
        assert_eq!(state.info.last_traded["ASML"], 99.5);
        assert_eq!(state.info.ticks.len("ASML"), 1);
    }

    #[test]
    fn test_instrument_lifecycle_events() {
        let mut state = state();
        let created = InstrumentCreated::from_instrument(&Instrument::new("ASML", 0.01));
        dispatch(&mut state, ChannelKind::Info, Message::InstrumentCreated(created)).unwrap();
        dispatch(
            &mut state,
            ChannelKind::Info,
            Message::InstrumentPaused(InstrumentEvent::new("ASML")),
        )
        .unwrap();
        assert!(state.info.instruments.get("ASML").unwrap().paused);

        dispatch(
            &mut state,
            ChannelKind::Info,
            Message::InstrumentExpired(InstrumentEvent::new("ASML")),
        )
        .unwrap();
        assert!(state.info.instruments.all().is_empty());

        assert_eq!(
            dispatch(
                &mut state,
                ChannelKind::Info,
                Message::InstrumentResumed(InstrumentEvent::new("ASML")),
            ),
            Err(ProtocolError::UnknownInstrument("ASML".into()))
        );
    }

    #[test]
    fn test_notices_are_logged_not_stored() {
        let mut state = state();
        let notification = Notification {
            source: "admin".into(),
            message: "market closes in 5 minutes".into(),
        };
        dispatch(
            &mut state,
            ChannelKind::Execution,
            Message::Notification(notification.clone()),
        )
        .unwrap();
        dispatch(
            &mut state,
            ChannelKind::Execution,
            Message::ForcedDisconnect(ForcedDisconnect {
                reason: "duplicate login".into(),
            }),
        )
        .unwrap();
        assert!(state.exec.ledger.positions().is_empty());

        assert_eq!(
            dispatch(&mut state, ChannelKind::Info, Message::Notification(notification)),
            Err(ProtocolError::UnexpectedMessage {
                channel: ChannelKind::Info,
                message_type: MessageType::Notification,
            })
        );
    }

    #[test]
    fn test_requests_are_not_pushes() {
        let mut state = state();
        let request = Message::DeleteOrders(DeleteOrders {
            request_id: 1,
            instrument_id: "ASML".into(),
        });
        assert!(dispatch(&mut state, ChannelKind::Execution, request).is_err());
    }
}

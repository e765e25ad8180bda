//! Bodies of the messages exchanged with the server.
//!
//! Sides and actions travel as text (`"bid"`, `"sell"`, ...) and are only
//! turned into typed values by the `to_*` conversions below, which is where an
//! unknown value is rejected.

use crate::error::ProtocolError;
use chrono::{DateTime, TimeZone, Utc};
use exchange::{
    Action, Instrument, InstrumentId, OrderId, OrderStatus, PositionEntry, PriceBook,
    PriceChangeLimit, PriceVolume, Side, SingleSidedBooking, Trade, TradeTick,
};
use serde::{Deserialize, Serialize};

fn parse_side(side: &str) -> Result<Side, ProtocolError> {
    side.parse()
        .map_err(|_| ProtocolError::UnknownSide(side.to_string()))
}

fn parse_action(action: &str) -> Result<Action, ProtocolError> {
    action
        .parse()
        .map_err(|_| ProtocolError::UnknownAction(action.to_string()))
}

// ---------------------------------------------------------------------------
// Requests

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoSubscribe {
    pub request_id: u64,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub request_id: u64,
    pub username: String,
    pub password: String,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertOrder {
    pub request_id: u64,
    pub instrument_id: InstrumentId,
    pub price: f64,
    pub volume: i64,
    pub side: String,
    pub order_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmendOrder {
    pub request_id: u64,
    pub instrument_id: InstrumentId,
    pub order_id: OrderId,
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteOrder {
    pub request_id: u64,
    pub instrument_id: InstrumentId,
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteOrders {
    pub request_id: u64,
    pub instrument_id: InstrumentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateInstrumentParameters {
    pub request_id: u64,
    pub instrument_id: InstrumentId,
    /// JSON document.
    pub parameters: String,
}

// ---------------------------------------------------------------------------
// Replies

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePosition {
    pub instrument_id: InstrumentId,
    pub volume: i64,
    pub cash: f64,
}

impl WirePosition {
    pub fn new(instrument_id: impl Into<InstrumentId>, volume: i64, cash: f64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            volume,
            cash,
        }
    }

    pub fn to_entry(&self) -> (InstrumentId, PositionEntry) {
        (
            self.instrument_id.clone(),
            PositionEntry::new(self.volume, self.cash),
        )
    }
}

/// Outcome of a request, as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplyBody {
    Ack,
    LoggedIn { positions: Vec<WirePosition> },
    OrderInserted { order_id: OrderId },
    Success(bool),
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericReply {
    pub request_id: u64,
    pub body: ReplyBody,
}

impl GenericReply {
    pub fn new(request_id: u64, body: ReplyBody) -> Self {
        Self { request_id, body }
    }
}

// ---------------------------------------------------------------------------
// Information channel pushes

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WirePriceLevel {
    pub price: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBookUpdate {
    pub instrument_id: InstrumentId,
    pub bids: Vec<WirePriceLevel>,
    pub asks: Vec<WirePriceLevel>,
}

impl PriceBookUpdate {
    /// The book as seen at `received_at`; the server does not timestamp books.
    ///
    /// Levels are sorted best first: bids high to low, asks low to high.
    pub fn to_price_book(&self, received_at: DateTime<Utc>) -> PriceBook {
        let levels = |side: &[WirePriceLevel]| -> Vec<PriceVolume> {
            side.iter()
                .map(|l| PriceVolume::new(l.price, l.volume))
                .collect()
        };
        let mut bids = levels(&self.bids);
        let mut asks = levels(&self.asks);
        bids.sort_by(|a, b| b.price.total_cmp(&a.price));
        asks.sort_by(|a, b| a.price.total_cmp(&b.price));
        PriceBook::new(self.instrument_id.clone(), received_at, bids, asks)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTickUpdate {
    pub instrument_id: InstrumentId,
    pub price: f64,
    pub volume: i64,
    pub aggressor_side: String,
    pub buyer: String,
    pub seller: String,
    pub trade_id: i64,
    /// Nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,
}

impl TradeTickUpdate {
    pub fn to_trade_tick(&self) -> Result<TradeTick, ProtocolError> {
        Ok(TradeTick {
            timestamp: Utc.timestamp_nanos(self.timestamp_ns),
            instrument_id: self.instrument_id.clone(),
            price: self.price,
            volume: self.volume,
            aggressor_side: parse_side(&self.aggressor_side)?,
            buyer: self.buyer.clone(),
            seller: self.seller.clone(),
            trade_nr: self.trade_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WirePriceChangeLimit {
    pub absolute_change: f64,
    pub relative_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentCreated {
    pub instrument_id: InstrumentId,
    pub tick_size: f64,
    pub price_change_limit: Option<WirePriceChangeLimit>,
    /// JSON document with the optional spot/option definition.
    pub extra_info: String,
}

impl InstrumentCreated {
    pub fn from_instrument(instrument: &Instrument) -> Self {
        Self {
            instrument_id: instrument.instrument_id.clone(),
            tick_size: instrument.tick_size,
            price_change_limit: instrument.price_change_limit.map(|l| WirePriceChangeLimit {
                absolute_change: l.absolute_change,
                relative_change: l.relative_change,
            }),
            extra_info: instrument.to_extra_info(),
        }
    }

    pub fn to_instrument(&self) -> Result<Instrument, ProtocolError> {
        let limit = self
            .price_change_limit
            .map(|l| PriceChangeLimit::new(l.absolute_change, l.relative_change));
        Instrument::from_extra_info(
            self.instrument_id.clone(),
            self.tick_size,
            limit,
            &self.extra_info,
        )
        .map_err(|e| {
            ProtocolError::Malformed(format!(
                "extra_info of instrument {}: {}",
                self.instrument_id, e
            ))
        })
    }
}

/// Expiry, pause or resume of a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentEvent {
    pub instrument_id: InstrumentId,
}

impl InstrumentEvent {
    pub fn new(instrument_id: impl Into<InstrumentId>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentParametersUpdated {
    pub instrument_id: InstrumentId,
    pub parameters: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentStartupData {
    pub instrument_id: InstrumentId,
    pub last_traded_price: f64,
}

// ---------------------------------------------------------------------------
// Execution channel pushes

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub instrument_id: InstrumentId,
    pub price: f64,
    /// Remaining volume; zero once the order is filled or deleted.
    pub volume: i64,
    pub side: String,
}

impl OrderUpdate {
    pub fn to_order_status(&self) -> Result<OrderStatus, ProtocolError> {
        Ok(OrderStatus::new(
            self.order_id,
            self.instrument_id.clone(),
            self.price,
            self.volume,
            parse_side(&self.side)?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateTrade {
    pub order_id: OrderId,
    pub instrument_id: InstrumentId,
    pub price: f64,
    pub volume: i64,
    pub side: String,
}

impl PrivateTrade {
    pub fn to_trade(&self) -> Result<Trade, ProtocolError> {
        Ok(Trade {
            order_id: self.order_id,
            instrument_id: self.instrument_id.clone(),
            price: self.price,
            volume: self.volume,
            side: parse_side(&self.side)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub username: String,
    pub instrument_id: InstrumentId,
    pub price: f64,
    pub volume: i64,
    pub action: String,
}

impl Booking {
    pub fn to_booking(&self) -> Result<SingleSidedBooking, ProtocolError> {
        Ok(SingleSidedBooking {
            username: self.username.clone(),
            instrument_id: self.instrument_id.clone(),
            price: self.price,
            volume: self.volume,
            action: parse_action(&self.action)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcedDisconnect {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ping;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_trade_side_is_parsed() {
        let mut trade = PrivateTrade {
            order_id: 7,
            instrument_id: "ASML".into(),
            price: 100.0,
            volume: 5,
            side: "bid".into(),
        };
        assert_eq!(trade.to_trade().unwrap().side, Side::Bid);

        trade.side = "up".into();
        assert_eq!(
            trade.to_trade(),
            Err(ProtocolError::UnknownSide("up".into()))
        );
    }

    #[test]
    fn test_booking_action_is_parsed() {
        let mut booking = Booking {
            username: "alice".into(),
            instrument_id: "ASML".into(),
            price: 10.0,
            volume: 2,
            action: "sell".into(),
        };
        assert_eq!(booking.to_booking().unwrap().action, Action::Sell);

        booking.action = "hold".into();
        assert_eq!(
            booking.to_booking(),
            Err(ProtocolError::UnknownAction("hold".into()))
        );
    }

    #[test]
    fn test_price_book_levels_are_best_first() {
        let update = PriceBookUpdate {
            instrument_id: "ASML".into(),
            bids: vec![
                WirePriceLevel { price: 99.0, volume: 1 },
                WirePriceLevel { price: 99.5, volume: 2 },
                WirePriceLevel { price: 98.0, volume: 3 },
            ],
            asks: vec![
                WirePriceLevel { price: 101.0, volume: 4 },
                WirePriceLevel { price: 100.5, volume: 5 },
            ],
        };
        let book = update.to_price_book(Utc::now());

        let bids: Vec<f64> = book.bids.iter().map(|l| l.price).collect();
        let asks: Vec<f64> = book.asks.iter().map(|l| l.price).collect();
        assert_eq!(bids, vec![99.5, 99.0, 98.0]);
        assert_eq!(asks, vec![100.5, 101.0]);
        assert_eq!(book.best_bid().map(|l| l.volume), Some(2));
        assert_eq!(book.best_ask().map(|l| l.volume), Some(5));
    }

    #[test]
    fn test_trade_tick_timestamp() {
        let tick = TradeTickUpdate {
            instrument_id: "ASML".into(),
            price: 101.5,
            volume: 3,
            aggressor_side: "ask".into(),
            buyer: "bob".into(),
            seller: "alice".into(),
            trade_id: 42,
            timestamp_ns: 1_700_000_000_500_000_000,
        }
        .to_trade_tick()
        .unwrap();

        assert_eq!(tick.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(tick.timestamp.timestamp_subsec_millis(), 500);
        assert_eq!(tick.aggressor_side, Side::Ask);
        assert_eq!(tick.trade_nr, 42);
    }

    #[test]
    fn test_instrument_created_round_trips_definition() {
        let json = r#"{"instrument_type":"OPTION","base_instrument_id":"ASML","expiry":"2025-06-20 17:30:00","option_kind":"CALL","strike":700.0}"#;
        let instrument = Instrument::from_extra_info(
            "ASML_C700",
            0.1,
            Some(PriceChangeLimit::new(10.0, 0.2)),
            json,
        )
        .unwrap();

        let announced = InstrumentCreated::from_instrument(&instrument);
        assert_eq!(announced.to_instrument().unwrap(), instrument);
    }

    #[test]
    fn test_instrument_created_with_bad_extra_info() {
        let announced = InstrumentCreated {
            instrument_id: "ASML".into(),
            tick_size: 0.01,
            price_change_limit: None,
            extra_info: "[1, 2".into(),
        };
        assert!(matches!(
            announced.to_instrument(),
            Err(ProtocolError::Malformed(_))
        ));
    }
}

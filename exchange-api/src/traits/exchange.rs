use crate::model::book::PriceBook;
use crate::model::instrument::{Instrument, InstrumentId};
use crate::model::order::{OrderId, OrderStatus, OrderType, Side};
use crate::model::position::PositionEntry;
use crate::model::trade::{Trade, TradeTick};
use std::collections::HashMap;

/// The blocking surface a strategy uses to talk to the exchange.
///
/// Every call returns only once the exchange (or the client's local state) has
/// answered. Implementations must be usable from several threads at once.
pub trait ExchangeApi: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens both channels and logs in.
    ///
    /// `admin_password` is only needed for administrative clients.
    fn connect(
        &self,
        username: &str,
        password: &str,
        admin_password: Option<&str>,
    ) -> Result<(), Self::Error>;

    /// Closes both channels. Calling it twice is harmless.
    fn disconnect(&self) -> Result<(), Self::Error>;

    fn is_connected(&self) -> bool;

    /// Inserts a limit or IOC order and returns the exchange-assigned id.
    fn insert_order(
        &self,
        instrument_id: &str,
        price: f64,
        volume: i64,
        side: Side,
        order_type: OrderType,
    ) -> Result<OrderId, Self::Error>;

    /// Changes the volume of a resting order. `Ok(false)` if the exchange refused.
    fn amend_order(
        &self,
        instrument_id: &str,
        order_id: OrderId,
        volume: i64,
    ) -> Result<bool, Self::Error>;

    /// Deletes one order. `Ok(false)` if it no longer existed.
    fn delete_order(&self, instrument_id: &str, order_id: OrderId) -> Result<bool, Self::Error>;

    /// Deletes all our orders on an instrument.
    fn delete_orders(&self, instrument_id: &str) -> Result<(), Self::Error>;

    fn get_outstanding_orders(
        &self,
        instrument_id: &str,
    ) -> Result<HashMap<OrderId, OrderStatus>, Self::Error>;

    /// The last book snapshot received, if any.
    fn get_last_price_book(&self, instrument_id: &str) -> Result<Option<PriceBook>, Self::Error>;

    /// Private trades received since the previous poll.
    fn poll_new_trades(&self, instrument_id: &str) -> Result<Vec<Trade>, Self::Error>;

    /// Every private trade still retained, regardless of polling.
    fn get_trade_history(&self, instrument_id: &str) -> Result<Vec<Trade>, Self::Error>;

    /// Public trade ticks received since the previous poll.
    fn poll_new_trade_ticks(&self, instrument_id: &str) -> Result<Vec<TradeTick>, Self::Error>;

    /// Every public trade tick still retained, regardless of polling.
    fn get_trade_tick_history(&self, instrument_id: &str) -> Result<Vec<TradeTick>, Self::Error>;

    fn get_positions(&self) -> Result<HashMap<InstrumentId, i64>, Self::Error>;

    fn get_positions_and_cash(&self) -> Result<HashMap<InstrumentId, PositionEntry>, Self::Error>;

    /// Cash summed over all instruments.
    fn get_cash(&self) -> Result<f64, Self::Error>;

    /// Cash plus open positions valued at `valuations`, falling back to the last
    /// public traded price. Fails when a non-flat position has neither.
    fn get_pnl(&self, valuations: Option<&HashMap<InstrumentId, f64>>)
    -> Result<f64, Self::Error>;

    fn get_instruments(&self) -> Result<HashMap<InstrumentId, Instrument>, Self::Error>;

    /// Instruments that expired since the previous poll.
    fn poll_new_expired_instruments(&self)
    -> Result<HashMap<InstrumentId, Instrument>, Self::Error>;
}

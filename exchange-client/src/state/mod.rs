//! Client-side mirror of the exchange, owned by the reactor thread.
//!
//! # Submodules
//! - [`dispatcher`]: Routes pushed messages to the state they update.
//! - [`ledger`]: Positions and cash.
//! - [`history`]: Bounded, pollable trade histories.
//! - [`instruments`]: Instrument definitions and lifecycle.

pub mod dispatcher;
pub mod history;
pub mod instruments;
pub mod ledger;

pub use dispatcher::dispatch;
pub use history::{BoundedHistory, HistoryBook};
pub use instruments::InstrumentRegistry;
pub use ledger::PositionLedger;

use exchange::{InstrumentId, OrderId, OrderStatus, PriceBook, SingleSidedBooking, Trade, TradeTick};
use std::collections::HashMap;

/// State fed by the information channel.
#[derive(Debug, Clone)]
pub struct InfoState {
    pub books: HashMap<InstrumentId, PriceBook>,
    pub last_traded: HashMap<InstrumentId, f64>,
    pub ticks: HistoryBook<TradeTick>,
    pub instruments: InstrumentRegistry,
}

impl InfoState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            books: HashMap::new(),
            last_traded: HashMap::new(),
            ticks: HistoryBook::new(history_capacity),
            instruments: InstrumentRegistry::new(),
        }
    }

    pub fn apply_price_book(&mut self, book: PriceBook) {
        self.books.insert(book.instrument_id.clone(), book);
    }

    pub fn apply_trade_tick(&mut self, tick: TradeTick) {
        self.last_traded.insert(tick.instrument_id.clone(), tick.price);
        self.ticks.append(&tick.instrument_id.clone(), tick);
    }

    /// Last traded price as of subscription, before any tick arrives.
    pub fn seed_last_traded(&mut self, instrument_id: &str, price: f64) {
        self.last_traded.insert(instrument_id.to_string(), price);
    }
}

/// State fed by the execution channel.
#[derive(Debug, Clone)]
pub struct ExecState {
    pub ledger: PositionLedger,
    pub trades: HistoryBook<Trade>,
    pub orders: HashMap<InstrumentId, HashMap<OrderId, OrderStatus>>,
}

impl ExecState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            ledger: PositionLedger::new(),
            trades: HistoryBook::new(history_capacity),
            orders: HashMap::new(),
        }
    }

    /// Records the latest status of one of our orders; finished orders are dropped.
    pub fn apply_order_update(&mut self, status: OrderStatus) {
        let orders = self.orders.entry(status.instrument_id.clone()).or_default();
        if status.is_gone() {
            orders.remove(&status.order_id);
        } else {
            orders.insert(status.order_id, status);
        }
    }

    pub fn apply_trade(&mut self, trade: Trade) {
        self.ledger.apply_trade(&trade);
        self.trades.append(&trade.instrument_id.clone(), trade);
    }

    pub fn apply_booking(&mut self, booking: SingleSidedBooking) {
        self.ledger.apply_booking(&booking);
    }

    pub fn outstanding_orders(&self, instrument_id: &str) -> HashMap<OrderId, OrderStatus> {
        self.orders.get(instrument_id).cloned().unwrap_or_default()
    }
}

/// Everything the reactor knows about the session.
#[derive(Debug, Clone)]
pub struct ClientState {
    pub info: InfoState,
    pub exec: ExecState,
}

impl ClientState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            info: InfoState::new(history_capacity),
            exec: ExecState::new(history_capacity),
        }
    }

    pub fn pnl(&self, valuations: &HashMap<InstrumentId, f64>) -> crate::error::Result<f64> {
        self.exec.ledger.pnl(valuations, &self.info.last_traded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange::Side;

    #[test]
    fn test_order_updates_track_outstanding_orders() {
        let mut exec = ExecState::new(10);
        exec.apply_order_update(OrderStatus::new(1, "ASML", 100.0, 5, Side::Bid));
        exec.apply_order_update(OrderStatus::new(2, "ASML", 101.0, 3, Side::Ask));
        assert_eq!(exec.outstanding_orders("ASML").len(), 2);

        exec.apply_order_update(OrderStatus::new(1, "ASML", 100.0, 0, Side::Bid));
        let outstanding = exec.outstanding_orders("ASML");
        assert_eq!(outstanding.len(), 1);
        assert!(outstanding.contains_key(&2));
        assert!(exec.outstanding_orders("PHILIPS").is_empty());
    }

    #[test]
    fn test_fills_update_ledger_and_history() {
        let mut exec = ExecState::new(10);
        exec.apply_trade(Trade {
            order_id: 1,
            instrument_id: "ASML".into(),
            price: 100.0,
            volume: 5,
            side: Side::Bid,
        });

        assert_eq!(exec.ledger.volumes()["ASML"], 5);
        assert_eq!(exec.trades.history("ASML").len(), 1);
    }
}

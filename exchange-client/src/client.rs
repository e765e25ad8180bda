//! Blocking client facade.
//!
//! [`Exchange`] is what a strategy holds. Each method hops onto the reactor
//! thread, does its work there and blocks the calling thread until it is done,
//! so the type can be shared freely between threads.
//!
//! # Example
//!
//! ```no_run
//! use exchange::{ExchangeApi, OrderType, Side};
//! use exchange_client::{ClientConfig, Exchange};
//!
//! let exchange = Exchange::new(ClientConfig::default());
//! exchange.connect("trader", "secret", None)?;
//! let order_id = exchange.insert_order("ASML", 100.0, 5, Side::Bid, OrderType::Limit)?;
//! println!("inserted {}", order_id);
//! exchange.disconnect()?;
//! # Ok::<(), exchange_client::ClientError>(())
//! ```

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::reactor::{LoopStatus, ReactorThread};
use exchange::{
    ExchangeApi, Instrument, InstrumentId, OrderId, OrderStatus, OrderType, PositionEntry, PriceBook, Side, Trade,
    TradeTick,
};
use log::{error, info};
use std::collections::HashMap;

pub struct Exchange {
    reactor: ReactorThread,
}

impl Exchange {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            reactor: ReactorThread::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.reactor.config()
    }

    pub fn status(&self) -> LoopStatus {
        self.reactor.status()
    }

    /// Why the session ended, when the exchange or the network ended it.
    pub fn last_error(&self) -> Option<ClientError> {
        self.reactor.last_error()
    }

    /// Last public traded price, or the price the exchange reported at
    /// subscription if nothing traded since.
    pub fn get_last_traded_price(&self, instrument_id: &str) -> Result<Option<f64>> {
        let instrument_id = instrument_id.to_string();
        self.reactor
            .with_state(move |state| state.info.last_traded.get(&instrument_id).copied())
    }

    /// Replaces the free-form parameters of an instrument. Admin only.
    pub fn update_instrument_parameters(&self, instrument_id: &str, parameters: &serde_json::Value) -> Result<()> {
        let instrument_id = instrument_id.to_string();
        let parameters = parameters.to_string();
        self.reactor.run_on_loop(move |session| async move {
            session
                .update_instrument_parameters(instrument_id, parameters)
                .await
        })
    }

    pub fn clear_trade_history(&self) -> Result<()> {
        self.reactor
            .with_state(|state| state.exec.trades.clear_all())
    }

    pub fn clear_trade_tick_history(&self) -> Result<()> {
        self.reactor
            .with_state(|state| state.info.ticks.clear_all())
    }

    /// New private trades for every instrument that has any.
    pub fn poll_new_trades_all(&self) -> Result<HashMap<InstrumentId, Vec<Trade>>> {
        self.reactor
            .with_state(|state| state.exec.trades.poll_all_new())
    }

    /// New public trade ticks for every instrument that has any.
    pub fn poll_new_trade_ticks_all(&self) -> Result<HashMap<InstrumentId, Vec<TradeTick>>> {
        self.reactor
            .with_state(|state| state.info.ticks.poll_all_new())
    }
}

impl ExchangeApi for Exchange {
    type Error = ClientError;

    fn connect(&self, username: &str, password: &str, admin_password: Option<&str>) -> Result<()> {
        self.reactor.start()?;

        let username = username.to_string();
        let password = password.to_string();
        let admin_password = admin_password.map(str::to_string);
        let who = username.clone();
        let timeout = self.config().connect_timeout();
        let logged_in = self.reactor.run_on_loop(move |session| async move {
            let handshake = async {
                session.subscribe_info(admin_password.clone()).await?;
                session.login(username, password, admin_password).await
            };
            tokio::time::timeout(timeout, handshake)
                .await
                .map_err(|_| ClientError::ConnectionTimeout(timeout))?
        });

        if let Err(e) = logged_in {
            error!("Login as {} failed: {}", who, e);
            let _ = self.reactor.stop();
            return Err(e);
        }
        info!("Logged in as {}", who);
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        self.reactor.stop()
    }

    fn is_connected(&self) -> bool {
        self.reactor.is_live()
    }

    fn insert_order(
        &self,
        instrument_id: &str,
        price: f64,
        volume: i64,
        side: Side,
        order_type: OrderType,
    ) -> Result<OrderId> {
        let instrument_id = instrument_id.to_string();
        self.reactor.run_on_loop(move |session| async move {
            session
                .insert_order(instrument_id, price, volume, side, order_type)
                .await
        })
    }

    fn amend_order(&self, instrument_id: &str, order_id: OrderId, volume: i64) -> Result<bool> {
        let instrument_id = instrument_id.to_string();
        self.reactor.run_on_loop(move |session| async move {
            session.amend_order(instrument_id, order_id, volume).await
        })
    }

    fn delete_order(&self, instrument_id: &str, order_id: OrderId) -> Result<bool> {
        let instrument_id = instrument_id.to_string();
        self.reactor
            .run_on_loop(move |session| async move { session.delete_order(instrument_id, order_id).await })
    }

    fn delete_orders(&self, instrument_id: &str) -> Result<()> {
        let instrument_id = instrument_id.to_string();
        self.reactor
            .run_on_loop(move |session| async move { session.delete_orders(instrument_id).await })
    }

    fn get_outstanding_orders(&self, instrument_id: &str) -> Result<HashMap<OrderId, OrderStatus>> {
        let instrument_id = instrument_id.to_string();
        self.reactor
            .with_state(move |state| state.exec.outstanding_orders(&instrument_id))
    }

    fn get_last_price_book(&self, instrument_id: &str) -> Result<Option<PriceBook>> {
        let instrument_id = instrument_id.to_string();
        self.reactor
            .with_state(move |state| state.info.books.get(&instrument_id).cloned())
    }

    fn poll_new_trades(&self, instrument_id: &str) -> Result<Vec<Trade>> {
        let instrument_id = instrument_id.to_string();
        self.reactor
            .with_state(move |state| state.exec.trades.poll_new(&instrument_id))
    }

    fn get_trade_history(&self, instrument_id: &str) -> Result<Vec<Trade>> {
        let instrument_id = instrument_id.to_string();
        self.reactor
            .with_state(move |state| state.exec.trades.history(&instrument_id))
    }

    fn poll_new_trade_ticks(&self, instrument_id: &str) -> Result<Vec<TradeTick>> {
        let instrument_id = instrument_id.to_string();
        self.reactor
            .with_state(move |state| state.info.ticks.poll_new(&instrument_id))
    }

    fn get_trade_tick_history(&self, instrument_id: &str) -> Result<Vec<TradeTick>> {
        let instrument_id = instrument_id.to_string();
        self.reactor
            .with_state(move |state| state.info.ticks.history(&instrument_id))
    }

    fn get_positions(&self) -> Result<HashMap<InstrumentId, i64>> {
        self.reactor.with_state(|state| state.exec.ledger.volumes())
    }

    fn get_positions_and_cash(&self) -> Result<HashMap<InstrumentId, PositionEntry>> {
        self.reactor
            .with_state(|state| state.exec.ledger.positions())
    }

    fn get_cash(&self) -> Result<f64> {
        self.reactor
            .with_state(|state| state.exec.ledger.total_cash())
    }

    fn get_pnl(&self, valuations: Option<&HashMap<InstrumentId, f64>>) -> Result<f64> {
        let valuations = valuations.cloned().unwrap_or_default();
        self.reactor
            .with_state(move |state| state.pnl(&valuations))?
    }

    fn get_instruments(&self) -> Result<HashMap<InstrumentId, Instrument>> {
        self.reactor
            .with_state(|state| state.info.instruments.all())
    }

    fn poll_new_expired_instruments(&self) -> Result<HashMap<InstrumentId, Instrument>> {
        self.reactor
            .with_state(|state| state.info.instruments.poll_new_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_everything_fails_before_connect() {
        let exchange = Exchange::new(ClientConfig::default());

        assert!(!exchange.is_connected());
        assert_eq!(exchange.get_positions(), Err(ClientError::NotConnected));
        assert_eq!(
            exchange.insert_order("ASML", 1.0, 1, Side::Bid, OrderType::Limit),
            Err(ClientError::NotConnected)
        );
        assert_eq!(exchange.disconnect(), Ok(()));
    }
}

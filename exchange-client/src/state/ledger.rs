//! Per-instrument position and cash, kept in step with our own fills.

use crate::error::ClientError;
use exchange::{InstrumentId, PositionEntry, SingleSidedBooking, Trade};
use log::debug;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: HashMap<InstrumentId, PositionEntry>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the ledger with the positions the server reported at login.
    pub fn seed(&mut self, positions: impl IntoIterator<Item = (InstrumentId, PositionEntry)>) {
        self.positions = positions.into_iter().collect();
    }

    pub fn apply_trade(&mut self, trade: &Trade) {
        debug!(
            "Trade {} {} {}@{} (order {})",
            trade.instrument_id, trade.side, trade.volume, trade.price, trade.order_id
        );
        self.book(&trade.instrument_id, trade.side.sign(), trade.volume, trade.price);
    }

    pub fn apply_booking(&mut self, booking: &SingleSidedBooking) {
        debug!(
            "Booking {} {} {}@{} for {}",
            booking.instrument_id, booking.action, booking.volume, booking.price, booking.username
        );
        self.book(&booking.instrument_id, booking.action.sign(), booking.volume, booking.price);
    }

    fn book(&mut self, instrument_id: &str, sign: i64, volume: i64, price: f64) {
        let entry = self.positions.entry(instrument_id.to_string()).or_default();
        entry.volume += sign * volume;
        entry.cash -= (sign * volume) as f64 * price;
    }

    pub fn position(&self, instrument_id: &str) -> Option<PositionEntry> {
        self.positions.get(instrument_id).copied()
    }

    pub fn positions(&self) -> HashMap<InstrumentId, PositionEntry> {
        self.positions.clone()
    }

    pub fn volumes(&self) -> HashMap<InstrumentId, i64> {
        self.positions
            .iter()
            .map(|(id, entry)| (id.clone(), entry.volume))
            .collect()
    }

    pub fn total_cash(&self) -> f64 {
        self.positions.values().map(|entry| entry.cash).sum()
    }

    /// Cash plus every open position marked to market.
    ///
    /// An open position is valued at `valuations[id]` when given, otherwise at
    /// the instrument's last traded price. Flat positions contribute their
    /// cash only.
    pub fn pnl(
        &self,
        valuations: &HashMap<InstrumentId, f64>,
        last_traded: &HashMap<InstrumentId, f64>,
    ) -> Result<f64, ClientError> {
        let mut pnl = 0.0;
        for (instrument_id, entry) in &self.positions {
            pnl += entry.cash;
            if entry.is_flat() {
                continue;
            }
            let price = valuations
                .get(instrument_id)
                .or_else(|| last_traded.get(instrument_id))
                .ok_or_else(|| ClientError::NoPnlAvailable {
                    instrument_id: instrument_id.clone(),
                    volume: entry.volume,
                })?;
            pnl += entry.volume as f64 * price;
        }
        Ok(pnl)
    }
}

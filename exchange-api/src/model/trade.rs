//! Fill records.
//!
//! A [`Trade`] is private (we were one of the parties), a [`TradeTick`] is public
//! (any two parties). A [`SingleSidedBooking`] is an administrative adjustment of
//! our position that did not come from a matched trade.

use crate::model::UnknownVariant;
use crate::model::instrument::InstrumentId;
use crate::model::order::{OrderId, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A trade in which we were the buyer or the seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub order_id: OrderId,
    pub instrument_id: InstrumentId,
    pub price: f64,
    pub volume: i64,
    /// `Bid` if we bought, `Ask` if we sold.
    pub side: Side,
}

/// A public trade between any two parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub timestamp: DateTime<Utc>,
    pub instrument_id: InstrumentId,
    pub price: f64,
    pub volume: i64,
    /// Side of the party that initiated the trade.
    pub aggressor_side: Side,
    pub buyer: String,
    pub seller: String,
    pub trade_nr: i64,
}

/// Direction of a single-sided booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
        }
    }

    /// +1 for a buy, -1 for a sell.
    pub fn sign(&self) -> i64 {
        match self {
            Action::Buy => 1,
            Action::Sell => -1,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            other => Err(UnknownVariant::new("action", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleSidedBooking {
    pub username: String,
    pub instrument_id: InstrumentId,
    pub price: f64,
    pub volume: i64,
    pub action: Action,
}

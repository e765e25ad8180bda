use crate::model::UnknownVariant;
use crate::model::instrument::InstrumentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange-assigned order identifier.
pub type OrderId = u64;

/// The side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }

    /// +1 for a bid (buying), -1 for an ask (selling).
    pub fn sign(&self) -> i64 {
        match self {
            Side::Bid => 1,
            Side::Ask => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bid" => Ok(Side::Bid),
            "ask" => Ok(Side::Ask),
            other => Err(UnknownVariant::new("side", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Rests in the book until filled or deleted.
    Limit,
    /// Immediate-or-cancel: whatever does not trade on insert is dropped.
    Ioc,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Ioc => "ioc",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "limit" => Ok(OrderType::Limit),
            "ioc" => Ok(OrderType::Ioc),
            other => Err(UnknownVariant::new("order type", other)),
        }
    }
}

/// Summary of one of our own orders as last reported by the exchange.
///
/// A volume of zero means the order is gone (fully traded or deleted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub order_id: OrderId,
    pub instrument_id: InstrumentId,
    pub price: f64,
    pub volume: i64,
    pub side: Side,
}

impl OrderStatus {
    pub fn new(
        order_id: OrderId,
        instrument_id: impl Into<InstrumentId>,
        price: f64,
        volume: i64,
        side: Side,
    ) -> Self {
        Self {
            order_id,
            instrument_id: instrument_id.into(),
            price,
            volume,
            side,
        }
    }

    pub fn is_gone(&self) -> bool {
        self.volume == 0
    }
}

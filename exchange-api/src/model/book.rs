//! Order book snapshots.

use crate::model::instrument::InstrumentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A price level: price and the total volume resting there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceVolume {
    pub price: f64,
    pub volume: i64,
}

impl PriceVolume {
    pub fn new(price: f64, volume: i64) -> Self {
        Self { price, volume }
    }
}

/// Full snapshot of an instrument's book. Never a delta.
///
/// `bids` are sorted from highest to lowest price and `asks` from lowest to
/// highest, i.e. both from best to worst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBook {
    pub instrument_id: InstrumentId,
    /// Local time at which the snapshot was received.
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<PriceVolume>,
    pub asks: Vec<PriceVolume>,
}

impl PriceBook {
    pub fn new(
        instrument_id: impl Into<InstrumentId>,
        timestamp: DateTime<Utc>,
        bids: Vec<PriceVolume>,
        asks: Vec<PriceVolume>,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            timestamp,
            bids,
            asks,
        }
    }

    pub fn best_bid(&self) -> Option<&PriceVolume> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceVolume> {
        self.asks.first()
    }

    /// True when neither side has any level.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_levels() {
        let book = PriceBook::new(
            "PHILIPS_A",
            Utc::now(),
            vec![PriceVolume::new(100.0, 5), PriceVolume::new(99.5, 10)],
            vec![PriceVolume::new(100.5, 3)],
        );

        assert_eq!(book.best_bid().map(|l| l.price), Some(100.0));
        assert_eq!(book.best_ask().map(|l| l.volume), Some(3));
        assert!(!book.is_empty());
    }

    #[test]
    fn test_empty_book_has_no_best_levels() {
        let book = PriceBook::new("PHILIPS_A", Utc::now(), vec![], vec![]);
        assert!(book.is_empty());
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
    }
}

//! Core data models shared between the exchange client and its callers.
//!
//! # Submodules
//! - [`instrument`]: Instrument definitions and lifecycle flags.
//! - [`order`]: Sides, order types and outstanding-order summaries.
//! - [`trade`]: Private trades, public trade ticks and single-sided bookings.
//! - [`book`]: Price book snapshots.
//! - [`position`]: Per-instrument position and cash.

pub mod book;
pub mod instrument;
pub mod order;
pub mod position;
pub mod trade;

use thiserror::Error;

/// Text that does not name any variant of a closed protocol enum
/// (`bid`/`ask`, `buy`/`sell`, `limit`/`ioc`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

//! # Exchange API
//!
//! Domain model and blocking-surface trait shared by the exchange client and the
//! strategies that drive it.

pub mod model;
pub mod traits;

pub use model::UnknownVariant;
pub use model::book::{PriceBook, PriceVolume};
pub use model::instrument::{Instrument, InstrumentId, InstrumentType, OptionKind, PriceChangeLimit};
pub use model::order::{OrderId, OrderStatus, OrderType, Side};
pub use model::position::PositionEntry;
pub use model::trade::{Action, SingleSidedBooking, Trade, TradeTick};
pub use traits::exchange::ExchangeApi;

pub mod prelude {
    pub use crate::model::book::{PriceBook, PriceVolume};
    pub use crate::model::instrument::{Instrument, InstrumentId};
    pub use crate::model::order::{OrderId, OrderStatus, OrderType, Side};
    pub use crate::model::position::PositionEntry;
    pub use crate::model::trade::{Trade, TradeTick};
    pub use crate::traits::exchange::ExchangeApi;
}

use serde::{Deserialize, Serialize};

/// Net position and accumulated cash for one instrument.
///
/// Buying adds volume and spends cash, selling does the opposite, so for any
/// instrument `cash == -sum(sign * price * volume)` over every fill applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionEntry {
    pub volume: i64,
    pub cash: f64,
}

impl PositionEntry {
    pub fn new(volume: i64, cash: f64) -> Self {
        Self { volume, cash }
    }

    pub fn is_flat(&self) -> bool {
        self.volume == 0
    }
}

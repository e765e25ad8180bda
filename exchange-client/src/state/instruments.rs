//! Instruments announced on the information channel and their lifecycle.

use crate::error::ProtocolError;
use exchange::{Instrument, InstrumentId};
use log::{info, warn};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    active: HashMap<InstrumentId, Instrument>,
    /// Expired since the last [`poll_new_expired`](Self::poll_new_expired).
    expired: HashMap<InstrumentId, Instrument>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, instrument: Instrument) {
        info!("Instrument {} created", instrument.instrument_id);
        if self
            .active
            .insert(instrument.instrument_id.clone(), instrument)
            .is_some()
        {
            warn!("Instrument announced twice; keeping the latest definition");
        }
    }

    /// Moves an instrument from the active set to the expired buffer.
    pub fn expire(&mut self, instrument_id: &str) -> Result<(), ProtocolError> {
        let instrument = self
            .active
            .remove(instrument_id)
            .ok_or_else(|| ProtocolError::UnknownInstrument(instrument_id.to_string()))?;
        info!("Instrument {} expired", instrument_id);
        self.expired.insert(instrument_id.to_string(), instrument);
        Ok(())
    }

    pub fn pause(&mut self, instrument_id: &str) -> Result<(), ProtocolError> {
        self.get_mut(instrument_id)?.paused = true;
        info!("Instrument {} paused", instrument_id);
        Ok(())
    }

    pub fn resume(&mut self, instrument_id: &str) -> Result<(), ProtocolError> {
        self.get_mut(instrument_id)?.paused = false;
        info!("Instrument {} resumed", instrument_id);
        Ok(())
    }

    pub fn update_parameters(&mut self, instrument_id: &str, parameters: &str) -> Result<(), ProtocolError> {
        let parameters = serde_json::from_str(parameters).map_err(|e| {
            ProtocolError::Malformed(format!("parameters of instrument {}: {}", instrument_id, e))
        })?;
        self.get_mut(instrument_id)?.parameters = Some(parameters);
        Ok(())
    }

    fn get_mut(&mut self, instrument_id: &str) -> Result<&mut Instrument, ProtocolError> {
        self.active
            .get_mut(instrument_id)
            .ok_or_else(|| ProtocolError::UnknownInstrument(instrument_id.to_string()))
    }

    pub fn get(&self, instrument_id: &str) -> Option<&Instrument> {
        self.active.get(instrument_id)
    }

    pub fn contains(&self, instrument_id: &str) -> bool {
        self.active.contains_key(instrument_id)
    }

    pub fn all(&self) -> HashMap<InstrumentId, Instrument> {
        self.active.clone()
    }

    pub fn poll_new_expired(&mut self) -> HashMap<InstrumentId, Instrument> {
        std::mem::take(&mut self.expired)
    }
}

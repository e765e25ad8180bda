//! Defines the data model for tradable instruments.
//!
//! The exchange announces an instrument with a handful of fixed fields (id, tick
//! size, price-change limit) plus a free-form `extra_info` JSON document that
//! carries the optional spot/option definition. Fields in that document that
//! cannot be interpreted are logged and left empty; they never make the
//! instrument unusable.

use chrono::NaiveDateTime;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type InstrumentId = String;

/// Format of the `expiry` field inside `extra_info`.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    Spot,
    Option,
}

impl InstrumentType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "SPOT" => Some(InstrumentType::Spot),
            "OPTION" => Some(InstrumentType::Option),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Spot => "SPOT",
            InstrumentType::Option => "OPTION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionKind {
    Put,
    Call,
}

impl OptionKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "PUT" => Some(OptionKind::Put),
            "CALL" => Some(OptionKind::Call),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            OptionKind::Put => "PUT",
            OptionKind::Call => "CALL",
        }
    }
}

/// Limits on how far a trade may move the price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeLimit {
    pub absolute_change: f64,
    pub relative_change: f64,
}

impl PriceChangeLimit {
    pub fn new(absolute_change: f64, relative_change: f64) -> Self {
        Self {
            absolute_change,
            relative_change,
        }
    }
}

/// Static definition of an instrument plus its mutable lifecycle flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_id: InstrumentId,
    pub tick_size: f64,
    pub price_change_limit: Option<PriceChangeLimit>,
    pub instrument_type: Option<InstrumentType>,

    // Option definition
    pub base_instrument_id: Option<InstrumentId>,
    pub expiry: Option<NaiveDateTime>,
    pub option_kind: Option<OptionKind>,
    pub strike: Option<f64>,

    pub paused: bool,
    /// Free-form parameters set by an exchange administrator.
    pub parameters: Option<Value>,
    /// Keys of `extra_info` that have no dedicated field.
    pub extra: BTreeMap<String, Value>,
}

impl Instrument {
    /// Creates a bare instrument with only the mandatory fields set.
    pub fn new(instrument_id: impl Into<InstrumentId>, tick_size: f64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            tick_size,
            price_change_limit: None,
            instrument_type: None,
            base_instrument_id: None,
            expiry: None,
            option_kind: None,
            strike: None,
            paused: false,
            parameters: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_price_change_limit(mut self, limit: PriceChangeLimit) -> Self {
        self.price_change_limit = Some(limit);
        self
    }

    /// Builds an instrument from the fixed announcement fields and the
    /// `extra_info` JSON document.
    ///
    /// # Returns
    ///
    /// * `Ok(Instrument)` when `extra_info` is a JSON object (or empty).
    /// * `Err` when `extra_info` is not valid JSON or not an object.
    pub fn from_extra_info(
        instrument_id: impl Into<InstrumentId>,
        tick_size: f64,
        price_change_limit: Option<PriceChangeLimit>,
        extra_info: &str,
    ) -> Result<Self, serde_json::Error> {
        let mut instrument = Self::new(instrument_id, tick_size);
        instrument.price_change_limit = price_change_limit;

        if extra_info.trim().is_empty() {
            return Ok(instrument);
        }

        let mut fields: Map<String, Value> = serde_json::from_str(extra_info)?;
        let id = instrument.instrument_id.clone();

        instrument.instrument_type = take_field(&mut fields, &id, "instrument_type", |v| {
            v.as_str().and_then(InstrumentType::parse)
        });
        instrument.base_instrument_id = take_field(&mut fields, &id, "base_instrument_id", |v| {
            v.as_str().map(str::to_string)
        });
        instrument.expiry = take_field(&mut fields, &id, "expiry", |v| {
            v.as_str()
                .and_then(|s| NaiveDateTime::parse_from_str(s, EXPIRY_FORMAT).ok())
        });
        instrument.option_kind = take_field(&mut fields, &id, "option_kind", |v| {
            v.as_str().and_then(OptionKind::parse)
        });
        instrument.strike = take_field(&mut fields, &id, "strike", Value::as_f64);

        instrument.extra = fields.into_iter().collect();
        Ok(instrument)
    }

    /// Serializes the `extra_info` part of the definition: everything except
    /// the fields the protocol carries separately.
    pub fn to_extra_info(&self) -> String {
        let mut fields: Map<String, Value> = self
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        fields.insert(
            "instrument_type".into(),
            self.instrument_type
                .map_or(Value::Null, |t| Value::from(t.as_str())),
        );
        fields.insert(
            "base_instrument_id".into(),
            self.base_instrument_id
                .clone()
                .map_or(Value::Null, Value::from),
        );
        fields.insert(
            "expiry".into(),
            self.expiry.map_or(Value::Null, |e| {
                Value::from(e.format(EXPIRY_FORMAT).to_string())
            }),
        );
        fields.insert(
            "option_kind".into(),
            self.option_kind
                .map_or(Value::Null, |k| Value::from(k.as_str())),
        );
        fields.insert(
            "strike".into(),
            self.strike.map_or(Value::Null, Value::from),
        );

        Value::Object(fields).to_string()
    }

    pub fn is_option(&self) -> bool {
        self.instrument_type == Some(InstrumentType::Option)
    }
}

fn take_field<T>(
    fields: &mut Map<String, Value>,
    instrument_id: &str,
    key: &str,
    parse: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let value = fields.remove(key)?;
    if value.is_null() {
        return None;
    }
    let parsed = parse(&value);
    if parsed.is_none() {
        warn!(
            "Error while parsing field '{}' of instrument {}: {}",
            key, instrument_id, value
        );
    }
    parsed
}

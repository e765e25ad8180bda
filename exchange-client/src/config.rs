//! Client configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! { "host": "10.0.0.5", "max_nr_trade_history": 500 }
//! ```

use crate::comms::ChannelKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub info_port: u16,
    pub exec_port: u16,
    /// Capacity of each per-instrument trade and trade-tick history.
    pub max_nr_trade_history: usize,
    pub connect_timeout_ms: u64,
    /// How often connect/disconnect check on the reactor.
    pub poll_interval_ms: u64,
    /// Blocking calls slower than this are logged as a warning.
    pub slow_call_threshold_ms: u64,
    /// Trace every message sent and received.
    pub full_message_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            info_port: 7001,
            exec_port: 8001,
            max_nr_trade_history: 100,
            connect_timeout_ms: 5000,
            poll_interval_ms: 100,
            slow_call_threshold_ms: 1000,
            full_message_logging: false,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, info_port: u16, exec_port: u16) -> Self {
        Self {
            host: host.into(),
            info_port,
            exec_port,
            ..Self::default()
        }
    }

    /// Loads a config from a JSON file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        let reader = std::io::BufReader::new(file);
        let config = serde_json::from_reader(reader).context("Failed to deserialize config")?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create parent directory")?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        let mut file = std::fs::File::create(path).context("Failed to create config file")?;
        file.write_all(json.as_bytes())
            .context("Failed to write config file")?;
        Ok(())
    }

    pub fn with_trade_history(mut self, capacity: usize) -> Self {
        self.max_nr_trade_history = capacity;
        self
    }

    pub fn with_full_message_logging(mut self, enabled: bool) -> Self {
        self.full_message_logging = enabled;
        self
    }

    pub fn port(&self, channel: ChannelKind) -> u16 {
        match channel {
            ChannelKind::Info => self.info_port,
            ChannelKind::Execution => self.exec_port,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn slow_call_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_call_threshold_ms)
    }
}

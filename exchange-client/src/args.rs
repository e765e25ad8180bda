//! Command-line arguments shared by binaries that connect to the exchange.
//!
//! Values given on the command line override those from `--config`, which in
//! turn override the built-in defaults.

use crate::config::ClientConfig;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ConnectionArgs {
    /// JSON client config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exchange host
    #[arg(long)]
    host: Option<String>,

    /// Information channel port
    #[arg(long)]
    info_port: Option<u16>,

    /// Execution channel port
    #[arg(long)]
    exec_port: Option<u16>,

    #[arg(short, long, default_value = "trader")]
    username: String,

    #[arg(short, long, default_value = "", hide_default_value = true)]
    password: String,

    /// Only needed for administrative sessions
    #[arg(long)]
    admin_password: Option<String>,

    /// Trace every message sent and received
    #[arg(long)]
    full_message_logging: bool,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl ConnectionArgs {
    pub fn parse_args(args: Vec<String>) -> Self {
        ConnectionArgs::parse_from(args)
    }

    /// Builds the client config: file first, then command-line overrides.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.info_port {
            config.info_port = port;
        }
        if let Some(port) = self.exec_port {
            config.exec_port = port;
        }
        if self.full_message_logging {
            config.full_message_logging = true;
        }
        Ok(config)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn admin_password(&self) -> Option<&str> {
        self.admin_password.as_deref()
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> ConnectionArgs {
        ConnectionArgs::parse_args(list.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_defaults() {
        let parsed = args(&["demo"]);
        let config = parsed.client_config().unwrap();

        assert_eq!(config, ClientConfig::default());
        assert_eq!(parsed.username(), "trader");
        assert_eq!(parsed.admin_password(), None);
        assert_eq!(parsed.log_level(), "info");
    }

    #[test]
    fn test_overrides() {
        let parsed = args(&[
            "demo",
            "--host",
            "10.1.1.1",
            "--exec-port",
            "9001",
            "-u",
            "alice",
            "-p",
            "pw",
            "--full-message-logging",
        ]);
        let config = parsed.client_config().unwrap();

        assert_eq!(config.host, "10.1.1.1");
        assert_eq!(config.exec_port, 9001);
        assert_eq!(config.info_port, 7001);
        assert!(config.full_message_logging);
        assert_eq!(parsed.username(), "alice");
        assert_eq!(parsed.password(), "pw");
    }
}

//! Logging setup.
//!
//! The client logs through the `log` facade. Message-level tracing (enabled
//! with [`ClientConfig::full_message_logging`](crate::config::ClientConfig))
//! goes to the [`MESSAGE_TARGET`] target, so it can be switched on separately:
//!
//! ```text
//! RUST_LOG=info,exchange_client::messages=trace
//! ```

/// Log target of per-message traces.
pub const MESSAGE_TARGET: &str = "exchange_client::messages";

/// Installs `env_logger`, honouring `RUST_LOG` and falling back to `default_level`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}

//! # Exchange Client
//!
//! Blocking client for an electronic exchange that speaks a segmented binary
//! protocol over two TCP channels: an information channel for market data and
//! instrument lifecycle, and an execution channel for order entry and fills.
//!
//! ## Modules
//! - `args`: Command-line connection arguments.
//! - `comms`: Envelope framing, message schema, request correlation, sockets.
//! - `reactor`: The background thread that owns all I/O and state.
//! - `state`: Positions, order book snapshots, histories and instruments.
//! - `client`: The blocking [`Exchange`] facade.
//! - `config`: [`ClientConfig`] and its JSON loader.
//! - `logging`: `env_logger` setup.
//! - `testkit`: An in-process mock exchange (feature `test-utils`).

pub mod args;
pub mod comms;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod reactor;
pub mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;

pub use config::ClientConfig;
pub use error::{ClientError, FrameError, ProtocolError, Result};
pub use client::Exchange;

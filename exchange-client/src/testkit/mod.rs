//! Test helpers, enabled by the `test-utils` feature.

pub mod mock_exchange;

pub use mock_exchange::{eventually, position, MockExchange, MockSettings};

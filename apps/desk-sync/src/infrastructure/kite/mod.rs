//! Kite Connect Brokerage Adapter
//!
//! Implementation of `BrokeragePort` for the Kite Connect v3 REST API:
//! - Envelope decoding with typed exceptions
//! - Retry with exponential backoff for reads only
//! - CSV instrument dump parsing

mod adapter;
mod api_types;
mod config;
mod error;
mod http_client;
mod instruments;

pub use adapter::KiteBrokerageAdapter;
pub use config::{KiteConfig, RetryConfig};
pub use error::KiteError;
pub use instruments::parse_instruments;

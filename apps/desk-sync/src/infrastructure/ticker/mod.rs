//! Kite Ticker Adapter
//!
//! WebSocket streaming of binary market data into the tick cache.

pub mod codec;
mod client;
mod reconnect;

pub use client::{TickerClient, TickerClientConfig, TickerError, TickerHandle, ticker};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};

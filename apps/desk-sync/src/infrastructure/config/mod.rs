//! Configuration Module
//!
//! Configuration loading for the desk.

mod settings;

pub use settings::{
    ConfigError, Credentials, DEFAULT_API_URL, DEFAULT_PREFETCH_EXCHANGES, DEFAULT_TICKER_URL,
    DeskSettings, SyncSettings, TickerSettings, read_access_token,
};

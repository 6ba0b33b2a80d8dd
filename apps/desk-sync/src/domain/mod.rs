//! Domain Layer
//!
//! Core desk types with no I/O: symbol keys, the instrument directory,
//! row subscriptions, tick caching, sheet cells and order instructions.

pub mod account;
pub mod instrument;
pub mod market_data;
pub mod orders;
pub mod sheet;
pub mod subscription;
pub mod symbol;

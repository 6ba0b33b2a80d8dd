//! Application Layer
//!
//! Orchestrates the domain through the driven ports:
//!
//! - **Ports**: brokerage, tick feed and workbook interfaces
//! - **Session**: the shared context the use cases run against
//! - **Use Cases**: row refresh, INPUT maintenance, account sheets, orders
//! - **Services**: the refresh queue and the sync loop

pub mod ports;
pub mod services;
pub mod session;
pub mod use_cases;

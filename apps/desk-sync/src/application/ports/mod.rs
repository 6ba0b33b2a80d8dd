//! Application Ports (Driven)
//!
//! Interfaces the sync loop drives.
//! - **Brokerage**: account state, quotes, instruments and order calls
//! - **Tick feed**: subscription control on the streaming connection
//! - **Workbook**: range reads and writes on the spreadsheet

mod brokerage_port;
mod tick_feed_port;
mod workbook_port;

pub use brokerage_port::{BrokerageError, BrokeragePort};
pub use tick_feed_port::{FeedError, TickFeedPort};
pub use workbook_port::{WorkbookError, WorkbookPort};

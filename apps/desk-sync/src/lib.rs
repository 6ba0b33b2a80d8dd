#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Desk Sync - Brokerage to Spreadsheet Glue
//!
//! Keeps a trading spreadsheet in step with a Kite Connect account: live
//! prices stream into the INPUT sheet, positions, holdings, orders and
//! funds are polled into their own sheets, and order instructions typed
//! into the grid are placed, tracked, modified and cancelled.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: symbols, instruments, row subscriptions, ticks, cells and
//!   order instructions, with no I/O
//! - **Application**: ports, the shared session, use cases and the sync loop
//! - **Infrastructure**: Kite REST and ticker adapters, the workbook grid,
//!   the local HTTP server, config, logging and metrics
//!
//! # Data Flow
//!
//! ```text
//! Kite ticker WS ──► TickCache ◄──┐
//!                                 │
//! Kite REST ◄──────────────► SyncLoop ◄──► Workbook ◄──► macro layer
//!                                 ▲                          │
//!                                 └──── refresh queue ◄── POST /refresh_symbol
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Desk types with no external dependencies.
pub mod domain;

/// Application layer - Use cases, ports and the sync loop.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market_data::{Tick, TickCache};
pub use domain::subscription::{
    RowBinding, RowNumber, RowSubscriptionTracker, SubscriptionChanges, SubscriptionStats,
};
pub use domain::symbol::{InstrumentToken, SymbolKey};

// Application
pub use application::ports::{BrokeragePort, TickFeedPort, WorkbookPort};
pub use application::services::{SyncLoop, SyncLoopConfig, refresh_queue};
pub use application::session::{DeskSession, load_directory};

// Infrastructure config
pub use infrastructure::config::{ConfigError, Credentials, DeskSettings};

// HTTP server
pub use infrastructure::http::{DeskServer, HttpServerError, HttpState, create_router};

// Adapters
pub use infrastructure::kite::{KiteBrokerageAdapter, KiteConfig, KiteError};
pub use infrastructure::ticker::{TickerClient, TickerClientConfig, TickerHandle, ticker};
pub use infrastructure::workbook::MemoryWorkbook;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

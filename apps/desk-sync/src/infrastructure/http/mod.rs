//! Local HTTP Server
//!
//! Loopback endpoint for the spreadsheet's macro layer, plus status routes.
//!
//! # Endpoints
//!
//! - `POST /refresh_symbol` - Queue an INPUT row refresh
//! - `GET /sheets/{sheet}/{range}` - Read cells from the workbook grid
//! - `PUT /sheets/{sheet}/{range}` - Write cells into the workbook grid
//! - `GET /health` - JSON status
//! - `GET /metrics` - Prometheus metrics in text format

mod server;

pub use server::{
    DeskServer, HealthResponse, HealthStatus, HttpServerError, HttpState, MAX_BRIDGE_CELLS,
    create_router,
};

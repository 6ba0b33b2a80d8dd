//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the ports defined in the application layer,
//! plus process-level concerns (configuration, logging, metrics).

/// Environment configuration and the access-token file.
pub mod config;

/// Loopback HTTP server for refresh requests, the sheet bridge and status.
pub mod http;

/// Kite Connect REST adapter.
pub mod kite;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;

/// Kite ticker WebSocket client.
pub mod ticker;

/// In-memory workbook grid.
pub mod workbook;

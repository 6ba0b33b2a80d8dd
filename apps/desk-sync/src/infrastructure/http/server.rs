//! Router, handlers and the loopback server for the desk's HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{TickFeedPort, WorkbookPort};
use crate::application::services::{RefreshQueueError, RefreshSender};
use crate::domain::market_data::TickCache;
use crate::domain::sheet::{CellRange, Rows, SheetName};
use crate::domain::subscription::{RowSubscriptionTracker, SubscriptionStats};
use crate::infrastructure::metrics::{self, get_metrics_handle};

/// Largest block the sheet bridge reads or writes in one request.
pub const MAX_BRIDGE_CELLS: usize = 16_384 * 1_000;

/// Refresh rejection text the macro layer expects.
const BAD_ROW: &str = "Bad row from VBA";

// =============================================================================
// State
// =============================================================================

/// Shared state for the HTTP handlers.
pub struct HttpState {
    version: String,
    started_at: Instant,
    refresh: RefreshSender,
    workbook: Arc<dyn WorkbookPort>,
    feed: Arc<dyn TickFeedPort>,
    tracker: Arc<RowSubscriptionTracker>,
    ticks: Arc<TickCache>,
}

impl HttpState {
    /// Create handler state.
    #[must_use]
    pub fn new(
        refresh: RefreshSender,
        workbook: Arc<dyn WorkbookPort>,
        feed: Arc<dyn TickFeedPort>,
        tracker: Arc<RowSubscriptionTracker>,
        ticks: Arc<TickCache>,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
            refresh,
            workbook,
            feed,
            tracker,
            ticks,
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Build the router. Exposed for in-process testing.
pub fn create_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/refresh_symbol", post(refresh_symbol_handler))
        .route(
            "/sheets/{sheet}/{range}",
            get(read_sheet_handler).put(write_sheet_handler),
        )
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// Server
// =============================================================================

/// The desk's HTTP server.
pub struct DeskServer {
    port: u16,
    state: Arc<HttpState>,
    cancel: CancellationToken,
}

impl DeskServer {
    /// Create a server on `port`.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HttpState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Bind the loopback listener.
    ///
    /// Binding is split from serving so a taken port fails startup before
    /// the sync loop begins.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError::BindFailed` if the port cannot be bound.
    pub async fn bind(&self) -> Result<TcpListener, HttpServerError> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))
    }

    /// Serve on a bound listener until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError::ServerFailed` if the server hits a fatal
    /// error.
    pub async fn serve(self, listener: TcpListener) -> Result<(), HttpServerError> {
        tracing::info!(port = self.port, "HTTP server listening");

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server failed while running.
    #[error("HTTP server failed: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Refresh Endpoint
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct RefreshBody {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    row: Option<serde_json::Number>,
}

impl RefreshBody {
    /// Row as sent; spreadsheet macros may send `5.0`.
    #[allow(clippy::cast_possible_truncation)]
    fn row(&self) -> i64 {
        self.row
            .as_ref()
            .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)))
            .unwrap_or(0)
    }

    fn hint(&self) -> Option<String> {
        self.symbol
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
    }
}

fn err(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({"status": "err", "msg": msg.into()}))).into_response()
}

fn ok() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

async fn refresh_symbol_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<RefreshBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            metrics::record_refresh_request(false);
            tracing::debug!(error = %rejection.body_text(), "Unreadable refresh request");
            return err(StatusCode::BAD_REQUEST, BAD_ROW);
        }
    };

    let row = body.row();
    let hint = body.hint();
    match state.refresh.enqueue(row, hint.clone()) {
        Ok(()) => {
            metrics::record_refresh_request(true);
            tracing::debug!(row, hint = hint.as_deref().unwrap_or(""), "Queued row refresh");
            ok()
        }
        Err(RefreshQueueError::BadRow(_)) => {
            metrics::record_refresh_request(false);
            err(StatusCode::BAD_REQUEST, BAD_ROW)
        }
        Err(e @ RefreshQueueError::Closed) => {
            metrics::record_refresh_request(false);
            err(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

// =============================================================================
// Sheet Bridge
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct SheetValues {
    values: Rows,
}

fn sheet_target(sheet: &str, range: &str) -> Result<(SheetName, CellRange), Response> {
    let sheet = SheetName::parse(sheet)
        .ok_or_else(|| err(StatusCode::BAD_REQUEST, format!("unknown sheet {sheet}")))?;
    let range = CellRange::parse(range)
        .and_then(|range| range.check_size(MAX_BRIDGE_CELLS).map(|()| range))
        .map_err(|e| err(StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok((sheet, range))
}

async fn read_sheet_handler(
    State(state): State<Arc<HttpState>>,
    Path((sheet, range)): Path<(String, String)>,
) -> Response {
    let (sheet, range) = match sheet_target(&sheet, &range) {
        Ok(target) => target,
        Err(response) => return response,
    };
    match state.workbook.read_range(sheet, &range) {
        Ok(values) => (StatusCode::OK, Json(SheetValues { values })).into_response(),
        Err(e) => {
            metrics::record_workbook_error();
            err(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn write_sheet_handler(
    State(state): State<Arc<HttpState>>,
    Path((sheet, range)): Path<(String, String)>,
    body: Result<Json<SheetValues>, JsonRejection>,
) -> Response {
    let (sheet, range) = match sheet_target(&sheet, &range) {
        Ok(target) => target,
        Err(response) => return response,
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return err(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    match state.workbook.write_range(sheet, &range, &body.values) {
        Ok(()) => ok(),
        Err(e) => err(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

// =============================================================================
// Health and Metrics
// =============================================================================

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Ticker connected.
    Healthy,
    /// Ticker down; REST and the sheet bridge still work.
    Degraded,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Crate version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Whether the ticker connection is open.
    pub ticker_connected: bool,
    /// Row tracker counts.
    pub subscriptions: SubscriptionStats,
    /// Symbols with a cached tick.
    pub cached_ticks: usize,
}

async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let ticker_connected = state.feed.is_connected();
    let response = HealthResponse {
        status: if ticker_connected {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        ticker_connected,
        subscriptions: state.tracker.stats(),
        cached_ticks: state.ticks.len(),
    };
    (StatusCode::OK, Json(response))
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

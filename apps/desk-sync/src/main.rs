//! Desk Sync Binary
//!
//! Starts the ticker, the local HTTP server and the sync loop.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin desk-sync
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `KITE_API_KEY`: Kite Connect API key
//!
//! ## Optional
//! - `KITE_ACCESS_TOKEN_FILE`: Access token file (default: access_token.txt)
//! - `KITE_API_URL`: REST root (default: <https://api.kite.trade>)
//! - `KITE_TICKER_URL`: Ticker root (default: wss://ws.kite.trade)
//! - `DESK_HTTP_PORT`: Loopback HTTP port (default: 5000)
//! - `DESK_PREFETCH_EXCHANGES`: Instrument dumps to load (default: NSE,NFO,BSE,BFO,MCX)
//! - `DESK_GENERAL_INTERVAL_SECS`: General sync interval (default: 2)
//! - `DESK_INPUT_REFRESH_MS`: INPUT price refresh interval (default: 1000)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: desk_sync=info)

use std::sync::Arc;

use desk_sync::application::ports::{TickFeedPort, WorkbookPort};
use desk_sync::application::services::{SyncLoop, SyncLoopConfig, refresh_queue};
use desk_sync::application::session::{DeskSession, load_directory};
use desk_sync::infrastructure::config::DeskSettings;
use desk_sync::infrastructure::http::{DeskServer, HttpState};
use desk_sync::infrastructure::kite::{KiteBrokerageAdapter, KiteConfig};
use desk_sync::infrastructure::telemetry;
use desk_sync::infrastructure::ticker::{TickerClientConfig, ticker};
use desk_sync::infrastructure::workbook::MemoryWorkbook;
use desk_sync::{TickCache, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Desk Sync");

    let _metrics_handle = init_metrics();

    let settings = DeskSettings::from_env()?;
    log_settings(&settings);

    let shutdown_token = CancellationToken::new();

    let broker = Arc::new(KiteBrokerageAdapter::new(&KiteConfig::from_settings(
        &settings,
    ))?);
    let directory = Arc::new(load_directory(broker.as_ref(), &settings.prefetch_exchanges).await);
    if directory.is_empty() {
        tracing::warn!("Instrument directory is empty, rows will not resolve");
    }

    let ticks = Arc::new(TickCache::new());
    let (ticker_client, ticker_handle) = ticker(
        TickerClientConfig::from_settings(&settings),
        Arc::clone(&ticks),
        shutdown_token.clone(),
    );
    let feed = Arc::new(ticker_handle);

    let workbook = Arc::new(MemoryWorkbook::new());
    let session = DeskSession::new(
        broker,
        Arc::clone(&feed),
        Arc::clone(&workbook),
        directory,
        Arc::clone(&ticks),
    );

    let (refresh_tx, refresh_rx) = refresh_queue();

    let http_state = Arc::new(HttpState::new(
        refresh_tx,
        Arc::clone(&workbook) as Arc<dyn WorkbookPort>,
        Arc::clone(&feed) as Arc<dyn TickFeedPort>,
        session.shared_tracker(),
        Arc::clone(&ticks),
    ));
    let http_server = DeskServer::new(settings.http_port, http_state, shutdown_token.clone());
    let listener = http_server.bind().await?;

    tokio::spawn(async move {
        if let Err(e) = ticker_client.run().await {
            tracing::error!(error = %e, "Ticker stopped");
        }
    });

    tokio::spawn(async move {
        if let Err(e) = http_server.serve(listener).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    let sync_loop = SyncLoop::new(
        session,
        refresh_rx,
        SyncLoopConfig {
            loop_tick: settings.sync.loop_tick,
            general_interval: settings.sync.general_interval,
            input_refresh_interval: settings.sync.input_refresh_interval,
        },
    );
    let loop_handle = tokio::spawn(sync_loop.run(shutdown_token.clone()));

    tracing::info!("Desk ready");

    await_shutdown(shutdown_token).await;

    if let Err(e) = loop_handle.await {
        tracing::error!(error = %e, "Sync loop task failed");
    }

    tracing::info!("Desk Sync stopped");
    Ok(())
}

/// Log the parsed settings. Credentials stay out of the log.
fn log_settings(settings: &DeskSettings) {
    tracing::info!(
        api_url = %settings.api_url,
        ticker_url = %settings.ticker.url,
        http_port = settings.http_port,
        exchanges = ?settings.prefetch_exchanges,
        "Configuration loaded"
    );
    tracing::debug!(
        general_interval_ms = settings.sync.general_interval.as_millis(),
        input_refresh_ms = settings.sync.input_refresh_interval.as_millis(),
        loop_tick_ms = settings.sync.loop_tick.as_millis(),
        "Sync timing"
    );
}

/// Load `.env` from the current directory or the nearest ancestor that has one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM, then cancel every task.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }

    shutdown_token.cancel();
}

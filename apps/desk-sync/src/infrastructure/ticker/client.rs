//! Kite Ticker WebSocket Client
//!
//! Connects to `wss://ws.kite.trade`, keeps the desired token set
//! subscribed in full mode, and writes decoded ticks into the tick cache.
//!
//! The desired set lives in the [`TickerHandle`] and is replayed in full on
//! every (re)connect, so subscription changes made while disconnected are
//! never lost.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;

use super::codec::{self, CodecError, Command, Frame, Notice};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{FeedError, TickFeedPort};
use crate::domain::market_data::{TickCache, TickMode};
use crate::domain::symbol::InstrumentToken;
use crate::infrastructure::config::DeskSettings;
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the ticker client.
#[derive(Debug, thiserror::Error)]
pub enum TickerError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// No data within the read timeout.
    #[error("no data for {0:?}")]
    Stalled(Duration),

    /// Connection closed by the server.
    #[error("connection closed")]
    ConnectionClosed,

    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the ticker client.
#[derive(Debug, Clone)]
pub struct TickerClientConfig {
    /// Full WebSocket URL including credentials.
    pub url: String,
    /// Reconnection backoff.
    pub reconnect: ReconnectConfig,
    /// Silence after which the connection is dropped and retried.
    pub read_timeout: Duration,
}

impl TickerClientConfig {
    /// Build from desk settings.
    #[must_use]
    pub fn from_settings(settings: &DeskSettings) -> Self {
        Self {
            url: settings.ticker_url(),
            reconnect: ReconnectConfig::from_ticker_settings(&settings.ticker),
            read_timeout: settings.ticker.read_timeout,
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

#[derive(Debug)]
struct Shared {
    desired: RwLock<BTreeSet<InstrumentToken>>,
    connected: AtomicBool,
}

/// Subscription control for a running [`TickerClient`].
#[derive(Debug, Clone)]
pub struct TickerHandle {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl TickerHandle {
    /// Tokens that should be streaming, ascending.
    #[must_use]
    pub fn desired_tokens(&self) -> Vec<InstrumentToken> {
        self.shared.desired.read().iter().copied().collect()
    }

    fn send(&self, command: Command) -> Result<(), FeedError> {
        if !self.is_connected() {
            return Err(FeedError::NotConnected);
        }
        self.commands
            .send(command)
            .map_err(|_| FeedError::ChannelClosed)
    }
}

impl TickFeedPort for TickerHandle {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn subscribe(&self, tokens: &[InstrumentToken]) -> Result<(), FeedError> {
        if tokens.is_empty() {
            return Ok(());
        }
        self.shared.desired.write().extend(tokens.iter().copied());
        self.send(Command::Subscribe(tokens.to_vec()))?;
        self.send(Command::Mode(TickMode::Full, tokens.to_vec()))
    }

    fn unsubscribe(&self, tokens: &[InstrumentToken]) -> Result<(), FeedError> {
        if tokens.is_empty() {
            return Ok(());
        }
        {
            let mut desired = self.shared.desired.write();
            for token in tokens {
                desired.remove(token);
            }
        }
        self.send(Command::Unsubscribe(tokens.to_vec()))
    }
}

// =============================================================================
// Client
// =============================================================================

/// Kite ticker WebSocket client.
pub struct TickerClient {
    config: TickerClientConfig,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    ticks: Arc<TickCache>,
    cancel: CancellationToken,
}

/// Create a client and its control handle.
#[must_use]
pub fn ticker(
    config: TickerClientConfig,
    ticks: Arc<TickCache>,
    cancel: CancellationToken,
) -> (TickerClient, TickerHandle) {
    let shared = Arc::new(Shared {
        desired: RwLock::new(BTreeSet::new()),
        connected: AtomicBool::new(false),
    });
    let (tx, rx) = mpsc::unbounded_channel();
    let client = TickerClient {
        config,
        shared: Arc::clone(&shared),
        commands: rx,
        ticks,
        cancel,
    };
    (client, TickerHandle { shared, commands: tx })
}

impl TickerClient {
    /// Run the connection loop until cancelled or out of retries.
    ///
    /// # Errors
    ///
    /// Returns `TickerError::MaxReconnectAttemptsExceeded` when the retry
    /// budget for one outage is spent.
    pub async fn run(mut self) -> Result<(), TickerError> {
        let mut reconnect_policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Ticker cancelled");
                return Ok(());
            }

            match self.connect_and_run(&mut reconnect_policy).await {
                Ok(()) => {
                    tracing::info!("Ticker closed gracefully");
                    return Ok(());
                }
                Err(e) => {
                    self.shared.connected.store(false, Ordering::Release);
                    tracing::warn!(error = %e, "Ticker connection error");

                    let Some(delay) = reconnect_policy.next_delay() else {
                        tracing::error!("Ticker giving up after repeated failures");
                        return Err(TickerError::MaxReconnectAttemptsExceeded);
                    };
                    metrics::record_reconnect();
                    tracing::info!(
                        attempt = reconnect_policy.attempt_count(),
                        delay_ms = delay.as_millis(),
                        "Reconnecting to ticker"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("Ticker cancelled during reconnect delay");
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn connect_and_run(
        &mut self,
        reconnect_policy: &mut ReconnectPolicy,
    ) -> Result<(), TickerError> {
        tracing::info!("Connecting to ticker");
        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.config.url).await?;
        let (mut write, mut read) = ws_stream.split();

        // The outage ends with the first frame, not the handshake.
        let mut streaming = false;
        // Commands queued before this connection are covered by the replay.
        while self.commands.try_recv().is_ok() {}
        self.shared.connected.store(true, Ordering::Release);

        let replay: Vec<InstrumentToken> = self.shared.desired.read().iter().copied().collect();
        tracing::info!(tokens = replay.len(), "Ticker connected");
        if !replay.is_empty() {
            for command in [
                Command::Subscribe(replay.clone()),
                Command::Mode(TickMode::Full, replay),
            ] {
                write.send(Message::Text(command.to_json()?.into())).await?;
            }
        }

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    self.shared.connected.store(false, Ordering::Release);
                    let close = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(close))).await {
                        tracing::debug!(error = %e, "Close frame not sent");
                    }
                    return Ok(());
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        return Ok(());
                    };
                    tracing::debug!(?command, "Sending ticker command");
                    write.send(Message::Text(command.to_json()?.into())).await?;
                }
                msg = tokio::time::timeout(self.config.read_timeout, read.next()) => {
                    match msg {
                        Err(_) => return Err(TickerError::Stalled(self.config.read_timeout)),
                        Ok(Some(Ok(Message::Binary(data)))) => {
                            if !streaming {
                                reconnect_policy.reset();
                                streaming = true;
                            }
                            self.handle_binary(&data);
                        }
                        Ok(Some(Ok(Message::Text(text)))) => handle_text(&text),
                        Ok(Some(Ok(Message::Ping(data)))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Ok(Some(Ok(Message::Close(frame)))) => {
                            tracing::info!(?frame, "Ticker sent close frame");
                            return Err(TickerError::ConnectionClosed);
                        }
                        Ok(Some(Ok(_))) => {}
                        Ok(Some(Err(e))) => return Err(e.into()),
                        Ok(None) => return Err(TickerError::ConnectionClosed),
                    }
                }
            }
        }
    }

    fn handle_binary(&self, data: &[u8]) {
        match codec::decode_frame(data) {
            Ok(Frame::Heartbeat) => tracing::trace!("Ticker heartbeat"),
            Ok(Frame::Ticks(ticks)) => {
                let received = ticks.len();
                let stored = self.ticks.record_batch(ticks);
                metrics::record_ticks(u64::try_from(received).unwrap_or(u64::MAX));
                tracing::trace!(received, stored, "Ticks recorded");
            }
            Err(e) => tracing::warn!(error = %e, bytes = data.len(), "Undecodable ticker frame"),
        }
    }
}

fn handle_text(text: &str) {
    match codec::decode_notice(text) {
        Ok(Notice::Order(data)) => tracing::info!(%data, "Order update"),
        Ok(Notice::Error(message)) => tracing::error!(%message, "Ticker error"),
        Ok(Notice::Message(message)) => tracing::info!(%message, "Ticker message"),
        Ok(Notice::Other(kind)) => tracing::debug!(%kind, "Unhandled ticker notice"),
        Err(e) => tracing::debug!(error = %e, "Unparseable ticker text"),
    }
}

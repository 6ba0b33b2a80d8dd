//! Periodic Sync Loop
//!
//! The single task that performs all sync-driven workbook I/O and all order
//! calls. Each iteration drains at most one refresh request, refreshes INPUT
//! prices when due, and runs the general sync when due.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::refresh_queue::RefreshReceiver;
use crate::application::ports::{BrokeragePort, TickFeedPort, WorkbookError, WorkbookPort};
use crate::application::session::DeskSession;
use crate::application::use_cases::{
    ManageOrdersUseCase, RefreshRowUseCase, RowOutcome, SyncInputUseCase, WriteAccountUseCase,
};
use crate::domain::account::{Holding, Position};
use crate::infrastructure::metrics;

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLoopConfig {
    /// Sleep between iterations.
    pub loop_tick: Duration,
    /// Interval between general syncs.
    pub general_interval: Duration,
    /// Minimum interval between INPUT price refreshes.
    pub input_refresh_interval: Duration,
}

impl Default for SyncLoopConfig {
    fn default() -> Self {
        Self {
            loop_tick: Duration::from_millis(10),
            general_interval: Duration::from_secs(2),
            input_refresh_interval: Duration::from_secs(1),
        }
    }
}

fn is_due(last: Option<Instant>, interval: Duration, now: Instant) -> bool {
    last.is_none_or(|at| now.duration_since(at) >= interval)
}

/// Log a failed workbook step and carry on.
fn logged<T>(step: &'static str, result: Result<T, WorkbookError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            metrics::record_workbook_error();
            tracing::warn!(step, error = %e, "Workbook step failed");
            None
        }
    }
}

/// The desk's main loop.
pub struct SyncLoop<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    session: DeskSession<B, F, W>,
    refresh_row: RefreshRowUseCase<B, F, W>,
    input: SyncInputUseCase<B, F, W>,
    account: WriteAccountUseCase<B, F, W>,
    orders: ManageOrdersUseCase<B, F, W>,
    refresh_rx: RefreshReceiver,
    config: SyncLoopConfig,
    first_run: bool,
    last_general: Option<Instant>,
    last_input: Option<Instant>,
}

impl<B, F, W> SyncLoop<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    /// Create the loop around a session and the consumer half of the
    /// refresh queue.
    pub fn new(
        session: DeskSession<B, F, W>,
        refresh_rx: RefreshReceiver,
        config: SyncLoopConfig,
    ) -> Self {
        Self {
            refresh_row: RefreshRowUseCase::new(session.clone()),
            input: SyncInputUseCase::new(session.clone()),
            account: WriteAccountUseCase::new(session.clone()),
            orders: ManageOrdersUseCase::new(session.clone()),
            session,
            refresh_rx,
            config,
            first_run: true,
            last_general: None,
            last_input: None,
        }
    }

    /// Whether the next general sync is the first since startup.
    pub const fn is_first_run(&self) -> bool {
        self.first_run
    }

    /// Run until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            loop_tick_ms = self.config.loop_tick.as_millis(),
            general_interval_ms = self.config.general_interval.as_millis(),
            "Sync loop started"
        );
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("Sync loop cancelled");
                    break;
                }
                () = tokio::time::sleep(self.config.loop_tick) => {}
            }
            self.run_iteration().await;
        }
    }

    /// One pass: at most one refresh request, then the timed steps.
    pub async fn run_iteration(&mut self) {
        self.process_refresh_request().await;

        let now = Instant::now();
        if is_due(self.last_input, self.config.input_refresh_interval, now)
            && !self.session.ticks().is_empty()
        {
            self.realtime_refresh().await;
            self.last_input = Some(now);
        }

        if is_due(self.last_general, self.config.general_interval, now) {
            self.general_sync().await;
            self.last_general = Some(Instant::now());
        }
    }

    /// Drain and process at most one refresh request.
    pub async fn process_refresh_request(&mut self) -> Option<RowOutcome> {
        let request = self.refresh_rx.try_next()?;
        let positions = self.net_positions().await;
        let outcome = logged(
            "refresh_row",
            self.refresh_row.refresh(request.row, &positions).await,
        )?;
        tracing::debug!(
            row = request.row,
            hint = request.symbol_hint.as_deref().unwrap_or(""),
            outcome = ?outcome,
            "Row refreshed"
        );
        Some(outcome)
    }

    /// Rewrite INPUT quantities, prices and P&L.
    pub async fn realtime_refresh(&mut self) {
        let positions = self.net_positions().await;
        let holdings = self.holdings().await;
        logged(
            "input_prices",
            self.input.refresh_prices(&positions, &holdings).await,
        );
    }

    /// Full account pass over every sheet.
    pub async fn general_sync(&mut self) {
        let positions = self.net_positions().await;
        let holdings = self.holdings().await;

        logged(
            "autofill",
            self.input.autofill(&positions, &holdings, self.first_run),
        );
        logged("reconcile", self.input.reconcile_subscriptions());
        logged("defaults", self.input.apply_defaults());
        logged("portfolio", self.account.write_portfolio(&positions));
        logged("holdings", self.account.write_holdings(&holdings));
        logged("orders", self.account.write_orders(self.first_run).await);
        if let Some(report) = logged("amendments", self.orders.process_amendments().await)
            && report != Default::default()
        {
            tracing::info!(?report, "Order amendments processed");
        }
        self.first_run = false;
        logged("funds", self.account.write_funds().await);
        if let Some(report) = logged("entries", self.orders.process_entries().await)
            && report != Default::default()
        {
            tracing::info!(?report, "Order entries processed");
        }

        metrics::record_sync_cycle();
    }

    async fn net_positions(&self) -> Vec<Position> {
        match self.session.broker().positions().await {
            Ok(positions) => positions.net,
            Err(e) => {
                metrics::record_brokerage_error("positions");
                tracing::warn!(error = %e, "Failed to fetch positions");
                Vec::new()
            }
        }
    }

    async fn holdings(&self) -> Vec<Holding> {
        match self.session.broker().holdings().await {
            Ok(holdings) => holdings,
            Err(e) => {
                metrics::record_brokerage_error("holdings");
                tracing::warn!(error = %e, "Failed to fetch holdings");
                Vec::new()
            }
        }
    }
}

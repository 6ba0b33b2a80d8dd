//! Desk Session
//!
//! The explicitly constructed context every use case shares: the three
//! driven ports plus the instrument directory, row tracker and tick cache.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;

use crate::application::ports::{BrokeragePort, TickFeedPort, WorkbookPort};
use crate::domain::instrument::InstrumentDirectory;
use crate::domain::market_data::{PriceFields, TickCache};
use crate::domain::subscription::{
    RowBinding, RowNumber, RowSubscriptionTracker, SubscriptionChanges,
};
use crate::domain::symbol::{RowLabel, SymbolKey};
use crate::infrastructure::metrics;

/// Local timestamp in the sheet's `YYYY-MM-DD HH:MM:SS` form.
#[must_use]
pub fn now_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `Last Updated: ...` header stamp.
#[must_use]
pub fn last_updated_stamp() -> String {
    format!("Last Updated: {}", now_stamp())
}

/// Shared desk state.
pub struct DeskSession<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    broker: Arc<B>,
    feed: Arc<F>,
    workbook: Arc<W>,
    directory: Arc<InstrumentDirectory>,
    tracker: Arc<RowSubscriptionTracker>,
    ticks: Arc<TickCache>,
}

impl<B, F, W> Clone for DeskSession<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            feed: Arc::clone(&self.feed),
            workbook: Arc::clone(&self.workbook),
            directory: Arc::clone(&self.directory),
            tracker: Arc::clone(&self.tracker),
            ticks: Arc::clone(&self.ticks),
        }
    }
}

impl<B, F, W> DeskSession<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    /// Assemble a session around a loaded directory and a tick cache shared
    /// with the streaming task.
    pub fn new(
        broker: Arc<B>,
        feed: Arc<F>,
        workbook: Arc<W>,
        directory: Arc<InstrumentDirectory>,
        ticks: Arc<TickCache>,
    ) -> Self {
        Self {
            broker,
            feed,
            workbook,
            directory,
            tracker: Arc::new(RowSubscriptionTracker::new()),
            ticks,
        }
    }

    /// Brokerage port.
    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Workbook port.
    pub fn workbook(&self) -> &W {
        &self.workbook
    }

    /// Instrument directory.
    pub fn directory(&self) -> &InstrumentDirectory {
        &self.directory
    }

    /// Row tracker.
    pub fn tracker(&self) -> &RowSubscriptionTracker {
        &self.tracker
    }

    /// Tick cache.
    pub fn ticks(&self) -> &TickCache {
        &self.ticks
    }

    /// Shared handle to the row tracker, for status reporting.
    pub fn shared_tracker(&self) -> Arc<RowSubscriptionTracker> {
        Arc::clone(&self.tracker)
    }

    /// Resolve a column A label to the binding the row should hold.
    ///
    /// Blank cells, markers, non-symbols and unknown symbols bind nothing.
    pub fn binding_for(&self, label: &RowLabel) -> Option<RowBinding> {
        let symbol = label.symbol()?;
        let token = self.directory.resolve(symbol)?;
        Some(RowBinding::new(symbol.clone(), token))
    }

    /// Rebind one row and push the resulting subscription changes.
    pub fn assign_row(&self, row: RowNumber, binding: Option<RowBinding>) {
        let changes = self.tracker.assign(row, binding);
        self.apply_changes(&changes);
    }

    /// Rebind a batch of rows and push the net subscription changes.
    pub fn reconcile_rows<I>(&self, rows: I)
    where
        I: IntoIterator<Item = (RowNumber, Option<RowBinding>)>,
    {
        let changes = self.tracker.reconcile(rows);
        self.apply_changes(&changes);
    }

    /// Route and subscribe new tokens, unroute and unsubscribe released ones.
    ///
    /// Feed errors are logged and otherwise ignored; the ticker replays its
    /// desired set on reconnect.
    pub fn apply_changes(&self, changes: &SubscriptionChanges) {
        if changes.is_empty() {
            return;
        }

        for token in &changes.unsubscribe {
            self.ticks.unroute(*token);
        }
        for token in &changes.subscribe {
            if let Some(symbol) = self.directory.symbol_for(*token) {
                self.ticks.route(*token, symbol.clone());
            }
        }

        if !changes.unsubscribe.is_empty()
            && let Err(e) = self.feed.unsubscribe(&changes.unsubscribe)
        {
            tracing::debug!(error = %e, tokens = changes.unsubscribe.len(), "Unsubscribe deferred");
        }
        if !changes.subscribe.is_empty()
            && let Err(e) = self.feed.subscribe(&changes.subscribe)
        {
            tracing::debug!(error = %e, tokens = changes.subscribe.len(), "Subscribe deferred");
        }

        tracing::info!(
            subscribed = ?changes.subscribe,
            unsubscribed = ?changes.unsubscribe,
            "Ticker subscriptions changed"
        );
        metrics::set_subscribed_tokens(self.tracker.stats().active_tokens);
    }

    /// Price fields for each symbol, from the tick cache where it has a last
    /// price and from one batched REST quote call for the rest.
    ///
    /// A failed quote call leaves those symbols with whatever the cache had.
    pub async fn price_fields(&self, symbols: &[SymbolKey]) -> HashMap<SymbolKey, PriceFields> {
        let snapshot = self.ticks.snapshot();
        let mut fields: HashMap<SymbolKey, PriceFields> = symbols
            .iter()
            .map(|symbol| {
                let cached = snapshot
                    .get(symbol)
                    .map(PriceFields::from_tick)
                    .unwrap_or_default();
                (symbol.clone(), cached)
            })
            .collect();

        let mut missing: Vec<SymbolKey> = fields
            .iter()
            .filter(|(_, f)| !f.has_last_price())
            .map(|(symbol, _)| symbol.clone())
            .collect();
        if missing.is_empty() {
            return fields;
        }
        missing.sort();

        match self.broker.quotes(&missing).await {
            Ok(quotes) => {
                for (symbol, quote) in quotes {
                    if let Some(entry) = fields.get_mut(&symbol) {
                        *entry = PriceFields::from_quote(&quote);
                    }
                }
            }
            Err(e) => {
                metrics::record_brokerage_error("quote");
                tracing::debug!(error = %e, symbols = missing.len(), "Quote fallback failed");
            }
        }
        fields
    }
}

/// Load the instrument dumps for `exchanges` into a fresh directory.
///
/// A failed exchange is logged and skipped.
pub async fn load_directory<B>(broker: &B, exchanges: &[String]) -> InstrumentDirectory
where
    B: BrokeragePort + ?Sized,
{
    let mut directory = InstrumentDirectory::new();
    for exchange in exchanges {
        match broker.instruments(exchange).await {
            Ok(instruments) => {
                let indexed = directory.insert_exchange(exchange, &instruments);
                tracing::info!(exchange = %exchange, instruments = indexed, "Instruments loaded");
            }
            Err(e) => {
                metrics::record_brokerage_error("instruments");
                tracing::warn!(exchange = %exchange, error = %e, "Failed to load instruments");
            }
        }
    }
    directory
}

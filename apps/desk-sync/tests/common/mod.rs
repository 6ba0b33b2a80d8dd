//! Shared fakes for the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use desk_sync::application::ports::{BrokerageError, BrokeragePort, FeedError, TickFeedPort};
use desk_sync::application::session::DeskSession;
use desk_sync::domain::account::{Holding, Margins, OrderRecord, Position, Positions};
use desk_sync::domain::instrument::{Instrument, InstrumentDirectory};
use desk_sync::domain::market_data::{Quote, TickCache};
use desk_sync::domain::orders::{CancelRequest, ModifyRequest, OrderRequest};
use desk_sync::domain::symbol::{InstrumentToken, SymbolKey};
use desk_sync::infrastructure::workbook::MemoryWorkbook;

// =============================================================================
// Brokerage
// =============================================================================

#[derive(Debug, Default)]
struct BrokerState {
    positions: Vec<Position>,
    holdings: Vec<Holding>,
    orders: Vec<OrderRecord>,
    histories: HashMap<String, Vec<OrderRecord>>,
    margins: Option<Margins>,
    quotes: HashMap<SymbolKey, Quote>,
    placed: Vec<OrderRequest>,
    modified: Vec<ModifyRequest>,
    cancelled: Vec<CancelRequest>,
    quote_calls: usize,
    next_order_id: u64,
    reject_orders: Option<String>,
}

/// Scripted brokerage that records every order call.
#[derive(Debug, Default)]
pub struct FakeBroker {
    state: Mutex<BrokerState>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BrokerState {
                next_order_id: 250_101_000_000_001,
                ..BrokerState::default()
            }),
        }
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        self.state.lock().positions = positions;
    }

    pub fn set_holdings(&self, holdings: Vec<Holding>) {
        self.state.lock().holdings = holdings;
    }

    pub fn set_orders(&self, orders: Vec<OrderRecord>) {
        self.state.lock().orders = orders;
    }

    pub fn set_history(&self, order_id: &str, history: Vec<OrderRecord>) {
        self.state
            .lock()
            .histories
            .insert(order_id.to_string(), history);
    }

    pub fn set_margins(&self, margins: Margins) {
        self.state.lock().margins = Some(margins);
    }

    pub fn set_quote(&self, symbol: &str, last_price: Decimal) {
        let quote = Quote {
            last_price: Some(last_price),
            ..Quote::default()
        };
        self.state
            .lock()
            .quotes
            .insert(SymbolKey::parse(symbol).unwrap(), quote);
    }

    pub fn reject_orders(&self, message: &str) {
        self.state.lock().reject_orders = Some(message.to_string());
    }

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.state.lock().placed.clone()
    }

    pub fn modified(&self) -> Vec<ModifyRequest> {
        self.state.lock().modified.clone()
    }

    pub fn cancelled(&self) -> Vec<CancelRequest> {
        self.state.lock().cancelled.clone()
    }

    pub fn quote_calls(&self) -> usize {
        self.state.lock().quote_calls
    }
}

#[async_trait]
impl BrokeragePort for FakeBroker {
    async fn positions(&self) -> Result<Positions, BrokerageError> {
        Ok(Positions {
            net: self.state.lock().positions.clone(),
            day: Vec::new(),
        })
    }

    async fn holdings(&self) -> Result<Vec<Holding>, BrokerageError> {
        Ok(self.state.lock().holdings.clone())
    }

    async fn orders(&self) -> Result<Vec<OrderRecord>, BrokerageError> {
        Ok(self.state.lock().orders.clone())
    }

    async fn order_history(&self, order_id: &str) -> Result<Vec<OrderRecord>, BrokerageError> {
        self.state
            .lock()
            .histories
            .get(order_id)
            .cloned()
            .ok_or_else(|| BrokerageError::Connection {
                message: format!("no history for {order_id}"),
            })
    }

    async fn margins(&self) -> Result<Margins, BrokerageError> {
        self.state.lock().margins.ok_or(BrokerageError::Timeout)
    }

    async fn quotes(
        &self,
        symbols: &[SymbolKey],
    ) -> Result<HashMap<SymbolKey, Quote>, BrokerageError> {
        let mut state = self.state.lock();
        state.quote_calls += 1;
        Ok(symbols
            .iter()
            .filter_map(|s| state.quotes.get(s).map(|q| (s.clone(), q.clone())))
            .collect())
    }

    async fn instruments(&self, _exchange: &str) -> Result<Vec<Instrument>, BrokerageError> {
        Ok(Vec::new())
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<String, BrokerageError> {
        let mut state = self.state.lock();
        if let Some(message) = state.reject_orders.clone() {
            return Err(BrokerageError::Rejected { message });
        }
        state.placed.push(request.clone());
        let order_id = state.next_order_id.to_string();
        state.next_order_id += 1;
        Ok(order_id)
    }

    async fn modify_order(&self, request: &ModifyRequest) -> Result<String, BrokerageError> {
        self.state.lock().modified.push(request.clone());
        Ok(request.order_id.clone())
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<String, BrokerageError> {
        self.state.lock().cancelled.push(request.clone());
        Ok(request.order_id.clone())
    }
}

// =============================================================================
// Tick Feed
// =============================================================================

/// Feed that records subscription traffic.
#[derive(Debug)]
pub struct FakeFeed {
    connected: bool,
    subscribed: Mutex<Vec<InstrumentToken>>,
    unsubscribed: Mutex<Vec<InstrumentToken>>,
}

impl Default for FakeFeed {
    fn default() -> Self {
        Self {
            connected: true,
            subscribed: Mutex::new(Vec::new()),
            unsubscribed: Mutex::new(Vec::new()),
        }
    }
}

impl FakeFeed {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::default()
        }
    }

    pub fn subscribed(&self) -> Vec<InstrumentToken> {
        self.subscribed.lock().clone()
    }

    pub fn unsubscribed(&self) -> Vec<InstrumentToken> {
        self.unsubscribed.lock().clone()
    }
}

impl TickFeedPort for FakeFeed {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&self, tokens: &[InstrumentToken]) -> Result<(), FeedError> {
        if !self.connected {
            return Err(FeedError::NotConnected);
        }
        self.subscribed.lock().extend_from_slice(tokens);
        Ok(())
    }

    fn unsubscribe(&self, tokens: &[InstrumentToken]) -> Result<(), FeedError> {
        if !self.connected {
            return Err(FeedError::NotConnected);
        }
        self.unsubscribed.lock().extend_from_slice(tokens);
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub const INFY_TOKEN: u32 = 12345;
pub const TCS_TOKEN: u32 = 67890;
pub const SBIN_TOKEN: u32 = 779_521;
pub const NIFTY_FUT_TOKEN: u32 = 13_238_786;

pub fn instrument(token: u32, exchange: &str, symbol: &str) -> Instrument {
    Instrument {
        token: InstrumentToken::new(token),
        exchange_token: token >> 8,
        tradingsymbol: symbol.to_string(),
        name: symbol.to_string(),
        expiry: (exchange == "NFO").then(|| NaiveDate::from_ymd_opt(2025, 1, 30).unwrap()),
        strike: Decimal::ZERO,
        tick_size: Decimal::new(5, 2),
        lot_size: 1,
        instrument_type: if exchange == "NFO" { "FUT" } else { "EQ" }.to_string(),
        segment: exchange.to_string(),
        exchange: exchange.to_string(),
    }
}

pub fn directory() -> InstrumentDirectory {
    let mut directory = InstrumentDirectory::new();
    directory.insert_exchange(
        "NSE",
        &[
            instrument(INFY_TOKEN, "NSE", "INFY"),
            instrument(TCS_TOKEN, "NSE", "TCS"),
            instrument(SBIN_TOKEN, "NSE", "SBIN"),
        ],
    );
    directory.insert_exchange("NFO", &[instrument(NIFTY_FUT_TOKEN, "NFO", "NIFTY25JANFUT")]);
    directory
}

pub fn position(exchange: &str, symbol: &str, quantity: i64, pnl: Decimal) -> Position {
    Position {
        tradingsymbol: symbol.to_string(),
        exchange: exchange.to_string(),
        quantity,
        pnl,
        product: "NRML".to_string(),
        ..Position::default()
    }
}

pub fn holding(exchange: &str, symbol: &str, quantity: i64) -> Holding {
    Holding {
        tradingsymbol: symbol.to_string(),
        exchange: exchange.to_string(),
        quantity,
        ..Holding::default()
    }
}

pub fn order(order_id: &str, status: &str, filled_quantity: i64) -> OrderRecord {
    OrderRecord {
        order_id: order_id.to_string(),
        variety: "regular".to_string(),
        status: status.to_string(),
        tradingsymbol: "INFY".to_string(),
        exchange: "NSE".to_string(),
        order_type: "LIMIT".to_string(),
        product: "CNC".to_string(),
        transaction_type: "BUY".to_string(),
        quantity: 10,
        filled_quantity,
        ..OrderRecord::default()
    }
}

/// A session over fakes, with handles to each for assertions.
pub struct Desk {
    pub broker: Arc<FakeBroker>,
    pub feed: Arc<FakeFeed>,
    pub workbook: Arc<MemoryWorkbook>,
    pub ticks: Arc<TickCache>,
    pub session: DeskSession<FakeBroker, FakeFeed, MemoryWorkbook>,
}

impl Desk {
    pub fn new() -> Self {
        Self::with_feed(FakeFeed::default())
    }

    pub fn with_feed(feed: FakeFeed) -> Self {
        let broker = Arc::new(FakeBroker::new());
        let feed = Arc::new(feed);
        let workbook = Arc::new(MemoryWorkbook::new());
        let ticks = Arc::new(TickCache::new());
        let session = DeskSession::new(
            Arc::clone(&broker),
            Arc::clone(&feed),
            Arc::clone(&workbook),
            Arc::new(directory()),
            Arc::clone(&ticks),
        );
        Self {
            broker,
            feed,
            workbook,
            ticks,
            session,
        }
    }
}

// =============================================================================
// Cell Helpers
// =============================================================================

use desk_sync::application::ports::WorkbookPort;
use desk_sync::domain::sheet::{CellRange, CellRef, CellValue, SheetName};

pub fn put(workbook: &MemoryWorkbook, sheet: SheetName, at: &str, value: impl Into<CellValue>) {
    let at = CellRef::parse(at).unwrap();
    workbook
        .write_cell(sheet, at.column, at.row, value.into())
        .unwrap();
}

pub fn get(workbook: &MemoryWorkbook, sheet: SheetName, at: &str) -> CellValue {
    let at = CellRef::parse(at).unwrap();
    workbook.read_cell(sheet, at.column, at.row).unwrap()
}

pub fn block(workbook: &MemoryWorkbook, sheet: SheetName, range: &str) -> Vec<Vec<CellValue>> {
    workbook
        .read_range(sheet, &CellRange::parse(range).unwrap())
        .unwrap()
}

pub fn key(symbol: &str) -> SymbolKey {
    SymbolKey::parse(symbol).unwrap()
}

pub fn tokens(raw: &[u32]) -> Vec<InstrumentToken> {
    raw.iter().copied().map(InstrumentToken::new).collect()
}

//! Market Data
//!
//! Streaming ticks, REST quotes, the nine price fields written to INPUT
//! `C:K`, and the process-wide tick cache.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::sheet::CellValue;
use super::symbol::{InstrumentToken, SymbolKey};

// =============================================================================
// Ticks
// =============================================================================

/// One level of market depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DepthLevel {
    /// Price at this level.
    pub price: Decimal,
    /// Quantity resting at this level.
    pub quantity: u64,
    /// Number of orders at this level.
    pub orders: u32,
}

/// Best five levels per side.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Depth {
    /// Bids, best first.
    pub buy: Vec<DepthLevel>,
    /// Offers, best first.
    pub sell: Vec<DepthLevel>,
}

impl Depth {
    /// Best bid price.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.buy.first().map(|level| level.price)
    }

    /// Best offer price.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.sell.first().map(|level| level.price)
    }
}

/// Session open, high, low and previous close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Ohlc {
    /// Open.
    pub open: Decimal,
    /// High.
    pub high: Decimal,
    /// Low.
    pub low: Decimal,
    /// Previous close.
    pub close: Decimal,
}

/// Streaming mode a tick was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// Last traded price only.
    Ltp,
    /// Price, volume and OHLC.
    Quote,
    /// Quote plus open interest, timestamps and depth.
    Full,
}

/// A decoded streaming tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    /// Instrument the tick is for.
    pub token: InstrumentToken,
    /// Mode the packet was sent in.
    pub mode: TickMode,
    /// Whether the instrument is tradable (indices are not).
    pub tradable: bool,
    /// Last traded price.
    pub last_price: Decimal,
    /// Last traded quantity.
    pub last_quantity: Option<u64>,
    /// Volume-weighted average traded price.
    pub average_price: Option<Decimal>,
    /// Volume traded today.
    pub volume: Option<u64>,
    /// Total pending buy quantity.
    pub buy_quantity: Option<u64>,
    /// Total pending sell quantity.
    pub sell_quantity: Option<u64>,
    /// Session OHLC.
    pub ohlc: Option<Ohlc>,
    /// Percent change against the previous close.
    pub change: Option<Decimal>,
    /// Time of the last trade.
    pub last_trade_time: Option<DateTime<Utc>>,
    /// Open interest.
    pub oi: Option<u64>,
    /// Session high of open interest.
    pub oi_day_high: Option<u64>,
    /// Session low of open interest.
    pub oi_day_low: Option<u64>,
    /// Exchange timestamp of the packet.
    pub exchange_timestamp: Option<DateTime<Utc>>,
    /// Market depth.
    pub depth: Option<Depth>,
}

impl Tick {
    /// Minimal tick carrying only a last price.
    #[must_use]
    pub const fn ltp(token: InstrumentToken, last_price: Decimal) -> Self {
        Self {
            token,
            mode: TickMode::Ltp,
            tradable: true,
            last_price,
            last_quantity: None,
            average_price: None,
            volume: None,
            buy_quantity: None,
            sell_quantity: None,
            ohlc: None,
            change: None,
            last_trade_time: None,
            oi: None,
            oi_day_high: None,
            oi_day_low: None,
            exchange_timestamp: None,
            depth: None,
        }
    }
}

// =============================================================================
// Quotes
// =============================================================================

/// Full market quote returned by the REST quote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Quote {
    /// Instrument token.
    pub instrument_token: u32,
    /// Last traded price.
    pub last_price: Option<Decimal>,
    /// Last traded quantity.
    pub last_quantity: Option<u64>,
    /// Average traded price.
    pub average_price: Option<Decimal>,
    /// Volume traded today.
    pub volume: Option<u64>,
    /// Total pending buy quantity.
    pub buy_quantity: Option<u64>,
    /// Total pending sell quantity.
    pub sell_quantity: Option<u64>,
    /// Session OHLC.
    pub ohlc: Option<Ohlc>,
    /// Absolute change against the previous close.
    pub net_change: Option<Decimal>,
    /// Open interest.
    pub oi: Option<Decimal>,
    /// Market depth.
    pub depth: Option<Depth>,
}

// =============================================================================
// Price Fields
// =============================================================================

/// The nine values written to INPUT `C:K`:
/// open, high, low, last, volume, average, best bid, best ask, close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceFields {
    /// Open.
    pub open: Option<Decimal>,
    /// High.
    pub high: Option<Decimal>,
    /// Low.
    pub low: Option<Decimal>,
    /// Last traded price.
    pub last: Option<Decimal>,
    /// Volume.
    pub volume: Option<u64>,
    /// Average traded price.
    pub average: Option<Decimal>,
    /// Best bid.
    pub best_bid: Option<Decimal>,
    /// Best ask.
    pub best_ask: Option<Decimal>,
    /// Previous close.
    pub close: Option<Decimal>,
}

impl PriceFields {
    /// Number of cells the fields occupy.
    pub const WIDTH: usize = 9;

    /// Fields from a cached tick.
    #[must_use]
    pub fn from_tick(tick: &Tick) -> Self {
        Self::assemble(
            tick.ohlc.as_ref(),
            Some(tick.last_price),
            tick.volume,
            tick.average_price,
            tick.depth.as_ref(),
        )
    }

    /// Fields from a REST quote.
    #[must_use]
    pub fn from_quote(quote: &Quote) -> Self {
        Self::assemble(
            quote.ohlc.as_ref(),
            quote.last_price,
            quote.volume,
            quote.average_price,
            quote.depth.as_ref(),
        )
    }

    fn assemble(
        ohlc: Option<&Ohlc>,
        last: Option<Decimal>,
        volume: Option<u64>,
        average: Option<Decimal>,
        depth: Option<&Depth>,
    ) -> Self {
        Self {
            open: ohlc.map(|o| o.open),
            high: ohlc.map(|o| o.high),
            low: ohlc.map(|o| o.low),
            last,
            volume,
            average,
            best_bid: depth.and_then(Depth::best_bid),
            best_ask: depth.and_then(Depth::best_ask),
            close: ohlc.map(|o| o.close),
        }
    }

    /// Whether a usable (non-zero) last price is present.
    #[must_use]
    pub fn has_last_price(&self) -> bool {
        self.last.is_some_and(|price| !price.is_zero())
    }

    /// Cells for `C:K`, in column order.
    #[must_use]
    pub fn to_cells(&self) -> Vec<CellValue> {
        vec![
            self.open.into(),
            self.high.into(),
            self.low.into(),
            self.last.into(),
            self.volume.into(),
            self.average.into(),
            self.best_bid.into(),
            self.best_ask.into(),
            self.close.into(),
        ]
    }
}

// =============================================================================
// Tick Cache
// =============================================================================

/// Point-in-time copy of the tick cache.
pub type TickSnapshot = HashMap<SymbolKey, Tick>;

#[derive(Debug, Default)]
struct CacheState {
    ticks: HashMap<SymbolKey, Tick>,
    routes: HashMap<InstrumentToken, SymbolKey>,
}

/// Latest tick per symbol, plus the token → symbol routing table the
/// streaming task keys incoming ticks by.
///
/// One mutex guards both maps.
#[derive(Debug, Default)]
pub struct TickCache {
    state: Mutex<CacheState>,
}

impl TickCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the tick for `symbol`.
    pub fn record(&self, symbol: SymbolKey, tick: Tick) {
        self.state.lock().ticks.insert(symbol, tick);
    }

    /// Store a tick under the symbol its token is routed to.
    ///
    /// Returns `false` (and drops the tick) when the token is not routed.
    pub fn record_for_token(&self, tick: Tick) -> bool {
        let mut state = self.state.lock();
        let Some(symbol) = state.routes.get(&tick.token).cloned() else {
            return false;
        };
        state.ticks.insert(symbol, tick);
        true
    }

    /// Store a batch of ticks, returning how many were routed.
    pub fn record_batch<I>(&self, ticks: I) -> usize
    where
        I: IntoIterator<Item = Tick>,
    {
        let mut state = self.state.lock();
        let mut stored = 0;
        for tick in ticks {
            if let Some(symbol) = state.routes.get(&tick.token).cloned() {
                state.ticks.insert(symbol, tick);
                stored += 1;
            }
        }
        stored
    }

    /// Latest tick for `symbol`.
    #[must_use]
    pub fn get(&self, symbol: &SymbolKey) -> Option<Tick> {
        self.state.lock().ticks.get(symbol).cloned()
    }

    /// Copy of every cached tick.
    #[must_use]
    pub fn snapshot(&self) -> TickSnapshot {
        self.state.lock().ticks.clone()
    }

    /// Number of cached symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().ticks.len()
    }

    /// Whether no tick has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().ticks.is_empty()
    }

    /// Route ticks for `token` to `symbol`.
    pub fn route(&self, token: InstrumentToken, symbol: SymbolKey) {
        self.state.lock().routes.insert(token, symbol);
    }

    /// Stop routing `token` and drop its cached tick.
    pub fn unroute(&self, token: InstrumentToken) {
        let mut state = self.state.lock();
        if let Some(symbol) = state.routes.remove(&token) {
            state.ticks.remove(&symbol);
        }
    }

    /// Number of routed tokens.
    #[must_use]
    pub fn routed_count(&self) -> usize {
        self.state.lock().routes.len()
    }
}

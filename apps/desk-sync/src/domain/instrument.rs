//! Instrument Directory
//!
//! Tradable instruments loaded once per exchange at startup, with
//! bidirectional lookup between symbol keys and instrument tokens.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::symbol::{InstrumentToken, SymbolKey};

/// One row of an exchange's instrument dump.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    /// Streaming token.
    pub token: InstrumentToken,
    /// Exchange-assigned token.
    pub exchange_token: u32,
    /// Trading symbol (`INFY`, `NIFTY25JAN24000CE`).
    pub tradingsymbol: String,
    /// Display name.
    pub name: String,
    /// Expiry date for derivatives.
    pub expiry: Option<NaiveDate>,
    /// Strike price for options.
    pub strike: Decimal,
    /// Minimum price increment.
    pub tick_size: Decimal,
    /// Contract lot size.
    pub lot_size: u32,
    /// `EQ`, `FUT`, `CE`, `PE`.
    pub instrument_type: String,
    /// Segment (`NSE`, `NFO-OPT`, ...).
    pub segment: String,
    /// Exchange (`NSE`, `NFO`, ...).
    pub exchange: String,
}

impl Instrument {
    /// Symbol key for this instrument.
    #[must_use]
    pub fn symbol_key(&self) -> Option<SymbolKey> {
        SymbolKey::from_parts(&self.exchange, &self.tradingsymbol)
    }
}

/// Bidirectional symbol ↔ token lookup.
///
/// Built once before the sync loop starts and read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct InstrumentDirectory {
    by_symbol: HashMap<SymbolKey, InstrumentToken>,
    by_token: HashMap<InstrumentToken, SymbolKey>,
    per_exchange: HashMap<String, usize>,
}

impl InstrumentDirectory {
    /// Empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exchange's instruments, keyed under `exchange`.
    ///
    /// Returns the number of instruments indexed. A later load of the same
    /// symbol replaces the earlier mapping.
    pub fn insert_exchange(&mut self, exchange: &str, instruments: &[Instrument]) -> usize {
        let mut indexed = 0;
        for instrument in instruments {
            let Some(key) = SymbolKey::from_parts(exchange, &instrument.tradingsymbol) else {
                continue;
            };
            if let Some(previous) = self.by_symbol.insert(key.clone(), instrument.token) {
                self.by_token.remove(&previous);
            }
            self.by_token.insert(instrument.token, key);
            indexed += 1;
        }
        *self
            .per_exchange
            .entry(exchange.trim().to_uppercase())
            .or_insert(0) += indexed;
        indexed
    }

    /// Token for a symbol key.
    #[must_use]
    pub fn resolve(&self, symbol: &SymbolKey) -> Option<InstrumentToken> {
        self.by_symbol.get(symbol).copied()
    }

    /// Symbol key for a token.
    #[must_use]
    pub fn symbol_for(&self, token: InstrumentToken) -> Option<&SymbolKey> {
        self.by_token.get(&token)
    }

    /// Number of indexed symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    /// Whether nothing was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Instruments indexed per exchange.
    #[must_use]
    pub const fn exchange_counts(&self) -> &HashMap<String, usize> {
        &self.per_exchange
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn equity(token: u32, exchange: &str, symbol: &str) -> Instrument {
        Instrument {
            token: InstrumentToken::new(token),
            exchange_token: token >> 8,
            tradingsymbol: symbol.to_string(),
            name: symbol.to_string(),
            expiry: None,
            strike: Decimal::ZERO,
            tick_size: dec!(0.05),
            lot_size: 1,
            instrument_type: "EQ".to_string(),
            segment: exchange.to_string(),
            exchange: exchange.to_string(),
        }
    }

    #[test]
    fn resolves_both_directions() {
        let mut directory = InstrumentDirectory::new();
        let indexed = directory.insert_exchange(
            "NSE",
            &[equity(408_065, "NSE", "INFY"), equity(2_953_217, "NSE", "TCS")],
        );
        assert_eq!(indexed, 2);

        let infy = SymbolKey::parse("NSE:INFY").unwrap();
        assert_eq!(directory.resolve(&infy), Some(InstrumentToken::new(408_065)));
        assert_eq!(
            directory.symbol_for(InstrumentToken::new(2_953_217)).map(SymbolKey::as_str),
            Some("NSE:TCS")
        );
        assert_eq!(directory.exchange_counts().get("NSE"), Some(&2));
    }

    #[test]
    fn unknown_symbols_do_not_resolve() {
        let mut directory = InstrumentDirectory::new();
        directory.insert_exchange("NSE", &[equity(408_065, "NSE", "INFY")]);
        assert!(directory.resolve(&SymbolKey::parse("BSE:INFY").unwrap()).is_none());
        assert!(directory.symbol_for(InstrumentToken::new(1)).is_none());
    }

    #[test]
    fn same_symbol_reload_replaces_token() {
        let mut directory = InstrumentDirectory::new();
        directory.insert_exchange("NSE", &[equity(1, "NSE", "INFY")]);
        directory.insert_exchange("NSE", &[equity(2, "NSE", "INFY")]);
        assert_eq!(directory.len(), 1);
        assert!(directory.symbol_for(InstrumentToken::new(1)).is_none());
        assert!(directory.symbol_for(InstrumentToken::new(2)).is_some());
    }
}

//! Symbol Keys and Instrument Tokens
//!
//! A symbol key is the `"EXCHANGE:TRADINGSYMBOL"` string that joins the
//! instrument directory, the tick cache and spreadsheet rows. Instrument
//! tokens are the numeric ids the streaming API speaks.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::sheet::CellValue;

// =============================================================================
// Symbol Key
// =============================================================================

/// Normalized `EXCHANGE:TRADINGSYMBOL` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SymbolKey(String);

impl SymbolKey {
    /// Parse a raw cell string into a symbol key.
    ///
    /// The value is trimmed and uppercased. Returns `None` when there is no
    /// colon or either side of the first colon is empty.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase();
        let (exchange, tradingsymbol) = normalized.split_once(':')?;
        if exchange.trim().is_empty() || tradingsymbol.trim().is_empty() {
            return None;
        }
        Some(Self(normalized))
    }

    /// Build a key from separate exchange and trading symbol fields.
    #[must_use]
    pub fn from_parts(exchange: &str, tradingsymbol: &str) -> Option<Self> {
        Self::parse(&format!("{exchange}:{tradingsymbol}"))
    }

    /// Exchange segment of the key (`NSE`, `NFO`, ...).
    #[must_use]
    pub fn exchange(&self) -> &str {
        self.0.split_once(':').map_or("", |(exchange, _)| exchange)
    }

    /// Trading symbol segment of the key.
    #[must_use]
    pub fn tradingsymbol(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, symbol)| symbol)
    }

    /// The full key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SymbolKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a symbol key: {value}"))
    }
}

impl From<SymbolKey> for String {
    fn from(key: SymbolKey) -> Self {
        key.0
    }
}

// =============================================================================
// Instrument Token
// =============================================================================

/// Numeric instrument id used by the streaming API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct InstrumentToken(u32);

impl InstrumentToken {
    /// Wrap a raw token.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw wire value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Exchange segment encoded in the low byte of the token.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn segment(self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

impl fmt::Display for InstrumentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Row Labels
// =============================================================================

/// Section markers written into INPUT column A by the autofill pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionMarker {
    /// Start of the holdings block.
    Holdings,
    /// Start of the open positions block.
    Portfolio,
    /// Start of the user-maintained block.
    Manual,
}

impl SectionMarker {
    /// Label as written in the sheet.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Holdings => "HOLDINGS",
            Self::Portfolio => "PORTFOLIO",
            Self::Manual => "MANUAL",
        }
    }

    /// Match an already normalized label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "HOLDINGS" => Some(Self::Holdings),
            "PORTFOLIO" => Some(Self::Portfolio),
            "MANUAL" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Interpretation of an INPUT column A cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowLabel {
    /// Empty, whitespace or a non-text value.
    Blank,
    /// One of the section markers.
    Marker(SectionMarker),
    /// A well-formed symbol key.
    Symbol(SymbolKey),
    /// Text that is neither a marker nor a symbol key.
    Unrecognized,
}

impl RowLabel {
    /// Classify a column A cell.
    #[must_use]
    pub fn classify(cell: &CellValue) -> Self {
        let Some(text) = cell.as_text() else {
            return Self::Blank;
        };
        let normalized = text.trim().to_uppercase();
        if normalized.is_empty() {
            return Self::Blank;
        }
        if let Some(marker) = SectionMarker::from_label(&normalized) {
            return Self::Marker(marker);
        }
        SymbolKey::parse(&normalized).map_or(Self::Unrecognized, Self::Symbol)
    }

    /// The symbol key, when this row carries one.
    #[must_use]
    pub const fn symbol(&self) -> Option<&SymbolKey> {
        match self {
            Self::Symbol(key) => Some(key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("NSE:INFY", Some("NSE:INFY"); "already normalized")]
    #[test_case("  nse:infy ", Some("NSE:INFY"); "trims and uppercases")]
    #[test_case("NFO:NIFTY25JANFUT", Some("NFO:NIFTY25JANFUT"); "derivative")]
    #[test_case("INFY", None; "no colon")]
    #[test_case("NSE:", None; "missing symbol")]
    #[test_case(":INFY", None; "missing exchange")]
    #[test_case("", None; "empty")]
    fn parse_symbol_key(raw: &str, expected: Option<&str>) {
        assert_eq!(SymbolKey::parse(raw).as_ref().map(SymbolKey::as_str), expected);
    }

    #[test]
    fn symbol_key_parts() {
        let key = SymbolKey::from_parts("bse", "sensex").unwrap();
        assert_eq!(key.exchange(), "BSE");
        assert_eq!(key.tradingsymbol(), "SENSEX");
        assert_eq!(key.to_string(), "BSE:SENSEX");
    }

    #[test]
    fn symbol_key_serde_round_trip_rejects_garbage() {
        let key: SymbolKey = serde_json::from_str("\"nse:tcs\"").unwrap();
        assert_eq!(key.as_str(), "NSE:TCS");
        assert!(serde_json::from_str::<SymbolKey>("\"TCS\"").is_err());
    }

    #[test]
    fn token_segment_is_low_byte() {
        assert_eq!(InstrumentToken::new(0x0001_2303).segment(), 3);
        assert_eq!(InstrumentToken::new(408_065).segment(), 1);
    }

    #[test]
    fn classify_labels() {
        assert_eq!(RowLabel::classify(&CellValue::Empty), RowLabel::Blank);
        assert_eq!(RowLabel::classify(&CellValue::from("   ")), RowLabel::Blank);
        assert_eq!(RowLabel::classify(&CellValue::Number(5.0)), RowLabel::Blank);
        assert_eq!(
            RowLabel::classify(&CellValue::from("manual")),
            RowLabel::Marker(SectionMarker::Manual)
        );
        assert_eq!(
            RowLabel::classify(&CellValue::from("hello")),
            RowLabel::Unrecognized
        );
        assert_eq!(
            RowLabel::classify(&CellValue::from("nse:infy"))
                .symbol()
                .map(SymbolKey::as_str),
            Some("NSE:INFY")
        );
    }
}

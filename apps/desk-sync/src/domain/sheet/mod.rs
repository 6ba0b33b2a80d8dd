//! Spreadsheet Cells
//!
//! Cell values, A1-style ranges and the fixed layout of the five sheets the
//! desk reads and writes.

pub mod layout;
mod range;

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

pub use range::{CellRange, CellRef, RangeError, column_name};

/// Row-major block of cell values.
pub type Rows = Vec<Vec<CellValue>>;

// =============================================================================
// Sheet Names
// =============================================================================

/// The sheets of the desk workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SheetName {
    /// Symbol rows, live prices and order entry.
    Input,
    /// Open net positions.
    Portfolio,
    /// Demat holdings.
    Holdings,
    /// Day's order book plus modify/cancel instructions.
    Orders,
    /// Margin summary.
    Funds,
}

impl SheetName {
    /// All sheets, in workbook order.
    pub const ALL: [Self; 5] = [
        Self::Input,
        Self::Portfolio,
        Self::Holdings,
        Self::Orders,
        Self::Funds,
    ];

    /// Tab name as shown in the workbook.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "INPUT",
            Self::Portfolio => "Portfolio",
            Self::Holdings => "Holdings",
            Self::Orders => "Orders",
            Self::Funds => "Funds",
        }
    }

    /// Case-insensitive lookup by tab name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sheet| sheet.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for SheetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cell Values
// =============================================================================

/// A single cell value.
///
/// Serialized untagged so the macro layer exchanges plain JSON scalars:
/// `null`, booleans, numbers and strings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Blank cell.
    #[default]
    Empty,
    /// Boolean cell.
    Bool(bool),
    /// Numeric cell.
    Number(f64),
    /// Text cell.
    Text(String),
}

impl CellValue {
    /// Text content, if this is a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// True for empty cells and whitespace-only text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    /// Numeric interpretation of the cell, accepting numeric text.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => text.trim().parse().ok(),
            Self::Empty | Self::Bool(_) => None,
        }
    }

    /// Integer interpretation; numeric cells are truncated toward zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(n.trunc() as i64),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Exact decimal interpretation of the cell.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => Decimal::try_from(*n).ok(),
            Self::Text(text) => Decimal::from_str(text.trim()).ok(),
            Self::Empty | Self::Bool(_) => None,
        }
    }

    /// Text rendering used for ids and labels read back from the sheet.
    ///
    /// Integral numbers render without a fractional part, so an order id the
    /// spreadsheet coerced to a number reads back unchanged.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{n:.0}"),
            Self::Number(n) => n.to_string(),
            Self::Text(text) => text.trim().to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<u64> for CellValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: u64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<Decimal> for CellValue {
    fn from(value: Decimal) -> Self {
        value.to_f64().map_or(Self::Empty, Self::Number)
    }
}

impl<T: Into<Self>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// Cell at a 1-based `column` of a row read from column `A`; empty when the
/// row is shorter.
#[must_use]
pub fn cell_at(row: &[CellValue], column: u32) -> &CellValue {
    static EMPTY: CellValue = CellValue::Empty;
    row.get(layout::offset(column)).unwrap_or(&EMPTY)
}

/// A row of `width` empty cells.
#[must_use]
pub fn blank_row(width: usize) -> Vec<CellValue> {
    vec![CellValue::Empty; width]
}

/// `height` rows of `width` empty cells.
#[must_use]
pub fn blank_rows(height: usize, width: usize) -> Rows {
    vec![blank_row(width); height]
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn sheet_names_parse_case_insensitively() {
        assert_eq!(SheetName::parse("input"), Some(SheetName::Input));
        assert_eq!(SheetName::parse("ORDERS"), Some(SheetName::Orders));
        assert_eq!(SheetName::parse("Settings"), None);
    }

    #[test]
    fn cell_values_use_plain_json() {
        let row = vec![
            CellValue::Empty,
            CellValue::Bool(true),
            CellValue::Number(1.5),
            CellValue::from("NSE:INFY"),
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[null,true,1.5,"NSE:INFY"]"#);

        let parsed: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, row);
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(CellValue::from("  25 ").as_i64(), Some(25));
        assert_eq!(CellValue::Number(10.0).as_i64(), Some(10));
        assert_eq!(CellValue::from("ten").as_i64(), None);
        assert_eq!(CellValue::from("101.25").as_decimal(), Some(dec!(101.25)));
        assert_eq!(CellValue::Empty.as_f64(), None);
    }

    #[test]
    fn display_text_drops_integral_fraction() {
        assert_eq!(
            CellValue::Number(250_101_000_012_345.0).display_text(),
            "250101000012345"
        );
        assert_eq!(CellValue::from(" 2501 ").display_text(), "2501");
        assert_eq!(CellValue::Number(1.25).display_text(), "1.25");
    }

    #[test]
    fn optional_values_become_empty() {
        assert_eq!(CellValue::from(None::<Decimal>), CellValue::Empty);
        assert_eq!(CellValue::from(Some(dec!(12.5))), CellValue::Number(12.5));
        assert!(CellValue::from("  ").is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }
}

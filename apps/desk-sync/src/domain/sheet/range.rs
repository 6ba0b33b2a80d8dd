//! A1-style cell references and rectangular ranges.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Largest column the grid addresses (`XFD`).
const MAX_COLUMN: u32 = 16_384;

/// Errors from parsing or shaping cell ranges.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// Reference is not of the form `C5` or `C5:K5`.
    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    /// Values do not fit inside the target range.
    #[error("{rows}x{columns} values do not fit range {range}")]
    ShapeMismatch {
        /// Target range.
        range: String,
        /// Rows supplied.
        rows: usize,
        /// Widest row supplied.
        columns: usize,
    },

    /// Range covers more cells than the caller allows.
    #[error("range {range} covers {cells} cells, limit is {limit}")]
    TooLarge {
        /// Requested range.
        range: String,
        /// Cells it covers.
        cells: usize,
        /// Allowed cells.
        limit: usize,
    },
}

/// Convert a 1-based column index to letters (`1` → `A`, `27` → `AA`).
#[must_use]
pub fn column_name(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(char::from(b'A' + u8::try_from(rem).unwrap_or(0)));
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn column_index(letters: &str) -> Option<u32> {
    letters.bytes().try_fold(0u32, |acc, b| {
        let digit = u32::from(b.to_ascii_uppercase().checked_sub(b'A')?) + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

#[allow(clippy::expect_used)] // Pattern is a compile-time constant
fn cell_pattern() -> &'static Regex {
    static CELL_REGEX: OnceLock<Regex> = OnceLock::new();
    CELL_REGEX.get_or_init(|| {
        Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]{1,7})$").expect("cell reference regex is valid")
    })
}

// =============================================================================
// Cell Reference
// =============================================================================

/// A single cell, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    /// Row number (1 = first row).
    pub row: u32,
    /// Column number (1 = column A).
    pub column: u32,
}

impl CellRef {
    /// Cell at `column`, `row`.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { row, column }
    }

    /// Parse an `A1` reference; `$` anchors are accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns `RangeError::InvalidReference` for anything else.
    pub fn parse(reference: &str) -> Result<Self, RangeError> {
        let invalid = || RangeError::InvalidReference(reference.to_string());
        let captures = cell_pattern().captures(reference.trim()).ok_or_else(invalid)?;

        let column = captures
            .get(1)
            .and_then(|m| column_index(m.as_str()))
            .filter(|c| (1..=MAX_COLUMN).contains(c))
            .ok_or_else(invalid)?;
        let row = captures
            .get(2)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|r| *r >= 1)
            .ok_or_else(invalid)?;

        Ok(Self { row, column })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.column), self.row)
    }
}

// =============================================================================
// Cell Range
// =============================================================================

/// Rectangular block of cells, inclusive on both corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    start: CellRef,
    end: CellRef,
}

impl CellRange {
    /// Range spanning two corners in any order.
    #[must_use]
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.column.min(b.column), a.row.min(b.row)),
            end: CellRef::new(a.column.max(b.column), a.row.max(b.row)),
        }
    }

    /// A single cell.
    #[must_use]
    pub const fn cell(column: u32, row: u32) -> Self {
        let at = CellRef::new(column, row);
        Self { start: at, end: at }
    }

    /// Columns `first..=last` of rows `top..=bottom`.
    #[must_use]
    pub fn block(first: u32, last: u32, top: u32, bottom: u32) -> Self {
        Self::new(CellRef::new(first, top), CellRef::new(last, bottom))
    }

    /// Columns `first..=last` of one row.
    #[must_use]
    pub fn row_span(row: u32, first: u32, last: u32) -> Self {
        Self::block(first, last, row, row)
    }

    /// Rows `top..=bottom` of one column.
    #[must_use]
    pub fn column_span(column: u32, top: u32, bottom: u32) -> Self {
        Self::block(column, column, top, bottom)
    }

    /// Parse `C5` or `C5:K5`.
    ///
    /// # Errors
    ///
    /// Returns `RangeError::InvalidReference` when either corner is invalid.
    pub fn parse(reference: &str) -> Result<Self, RangeError> {
        match reference.split_once(':') {
            Some((a, b)) => Ok(Self::new(CellRef::parse(a)?, CellRef::parse(b)?)),
            None => {
                let at = CellRef::parse(reference)?;
                Ok(Self { start: at, end: at })
            }
        }
    }

    /// Top-left corner.
    #[must_use]
    pub const fn start(&self) -> CellRef {
        self.start
    }

    /// Bottom-right corner.
    #[must_use]
    pub const fn end(&self) -> CellRef {
        self.end
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> usize {
        (self.end.row - self.start.row + 1) as usize
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        (self.end.column - self.start.column + 1) as usize
    }

    /// Number of cells covered.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.height().saturating_mul(self.width())
    }

    /// Reject ranges covering more than `limit` cells.
    ///
    /// # Errors
    ///
    /// Returns `RangeError::TooLarge` when the range is over the limit.
    pub fn check_size(&self, limit: usize) -> Result<(), RangeError> {
        let cells = self.cell_count();
        if cells > limit {
            return Err(RangeError::TooLarge {
                range: self.to_string(),
                cells,
                limit,
            });
        }
        Ok(())
    }

    /// Whether the range covers `cell`.
    #[must_use]
    pub const fn contains(&self, cell: CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.column >= self.start.column
            && cell.column <= self.end.column
    }

    /// Check that `values` fits inside this range when anchored at the
    /// top-left corner.
    ///
    /// # Errors
    ///
    /// Returns `RangeError::ShapeMismatch` when there are too many rows or a
    /// row is wider than the range.
    pub fn check_fits<T>(&self, values: &[Vec<T>]) -> Result<(), RangeError> {
        let widest = values.iter().map(Vec::len).max().unwrap_or(0);
        if values.len() > self.height() || widest > self.width() {
            return Err(RangeError::ShapeMismatch {
                range: self.to_string(),
                rows: values.len(),
                columns: widest,
            });
        }
        Ok(())
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(1, "A")]
    #[test_case(11, "K")]
    #[test_case(26, "Z")]
    #[test_case(27, "AA")]
    #[test_case(52, "AZ")]
    #[test_case(16_384, "XFD")]
    fn column_names(index: u32, name: &str) {
        assert_eq!(column_name(index), name);
        assert_eq!(column_index(name), Some(index));
    }

    #[test]
    fn size_limit_counts_cells() {
        let range = CellRange::parse("A1:XFD1000").unwrap();
        assert_eq!(range.cell_count(), 16_384_000);
        assert!(range.check_size(16_384_000).is_ok());

        let err = CellRange::parse("A1:XFD9999999")
            .unwrap()
            .check_size(16_384_000)
            .unwrap_err();
        assert!(matches!(err, RangeError::TooLarge { cells: 163_839_983_616, .. }));
    }

    #[test]
    fn parse_single_cell() {
        let range = CellRange::parse("R5").unwrap();
        assert_eq!(range.start(), CellRef::new(18, 5));
        assert_eq!(range.height(), 1);
        assert_eq!(range.width(), 1);
        assert_eq!(range.to_string(), "R5");
    }

    #[test]
    fn parse_block_normalizes_corners() {
        let range = CellRange::parse("K201:c2").unwrap();
        assert_eq!(range.start(), CellRef::new(3, 2));
        assert_eq!(range.end(), CellRef::new(11, 201));
        assert_eq!(range.width(), 9);
        assert_eq!(range.height(), 200);
        assert_eq!(range.to_string(), "C2:K201");
    }

    #[test]
    fn anchors_are_ignored() {
        assert_eq!(CellRef::parse("$AA$1").unwrap(), CellRef::new(27, 1));
    }

    #[test_case(""; "empty")]
    #[test_case("A0"; "row zero")]
    #[test_case("5C"; "reversed")]
    #[test_case("A1:"; "dangling colon")]
    #[test_case("ZZZZ1"; "column too wide")]
    fn rejects_invalid(reference: &str) {
        assert!(matches!(
            CellRange::parse(reference),
            Err(RangeError::InvalidReference(_))
        ));
    }

    #[test]
    fn shape_checks() {
        let range = CellRange::row_span(5, 3, 11);
        assert!(range.check_fits(&[vec![0; 9]]).is_ok());
        assert!(range.check_fits::<u8>(&[]).is_ok());
        assert!(range.check_fits(&[vec![0; 10]]).is_err());
        assert!(range.check_fits(&[vec![0; 1], vec![0; 1]]).is_err());
        assert!(range.contains(CellRef::new(11, 5)));
        assert!(!range.contains(CellRef::new(12, 5)));
    }
}

//! Workbook Port (Driven Port)
//!
//! Range reads and writes on the spreadsheet.

use crate::domain::sheet::{CellRange, CellValue, RangeError, Rows, SheetName};

/// Workbook port error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkbookError {
    /// Range is malformed or values do not fit it.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// The workbook could not be reached.
    #[error("workbook unavailable: {0}")]
    Unavailable(String),
}

/// Port for spreadsheet access.
pub trait WorkbookPort: Send + Sync {
    /// Read a range as rows. Every row has exactly `range.width()` cells.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the workbook cannot be read.
    fn read_range(&self, sheet: SheetName, range: &CellRange) -> Result<Rows, WorkbookError>;

    /// Write rows anchored at the range's top-left corner.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError::Range` when `values` does not fit `range`.
    fn write_range(
        &self,
        sheet: SheetName,
        range: &CellRange,
        values: &[Vec<CellValue>],
    ) -> Result<(), WorkbookError>;

    /// Read one cell.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the workbook cannot be read.
    fn read_cell(&self, sheet: SheetName, column: u32, row: u32) -> Result<CellValue, WorkbookError> {
        let rows = self.read_range(sheet, &CellRange::cell(column, row))?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.into_iter().next())
            .unwrap_or_default())
    }

    /// Write one cell.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the workbook cannot be written.
    fn write_cell(
        &self,
        sheet: SheetName,
        column: u32,
        row: u32,
        value: CellValue,
    ) -> Result<(), WorkbookError> {
        self.write_range(sheet, &CellRange::cell(column, row), &[vec![value]])
    }
}

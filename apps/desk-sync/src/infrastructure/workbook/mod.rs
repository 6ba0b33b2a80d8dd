//! In-Process Workbook
//!
//! Sparse cell grid implementing [`WorkbookPort`]. The spreadsheet's macro
//! layer mirrors it through the `/sheets` HTTP routes; the sync loop reads
//! and writes it directly.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::application::ports::{WorkbookError, WorkbookPort};
use crate::domain::sheet::{CellRange, CellRef, CellValue, Rows, SheetName};

/// Thread-safe sparse grid. Blank cells are not stored.
#[derive(Debug, Default)]
pub struct MemoryWorkbook {
    cells: RwLock<HashMap<SheetName, HashMap<CellRef, CellValue>>>,
}

impl MemoryWorkbook {
    /// Empty workbook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blank cells per sheet.
    #[must_use]
    pub fn populated_cells(&self) -> HashMap<SheetName, usize> {
        self.cells
            .read()
            .iter()
            .map(|(sheet, cells)| (*sheet, cells.len()))
            .collect()
    }
}

impl WorkbookPort for MemoryWorkbook {
    fn read_range(&self, sheet: SheetName, range: &CellRange) -> Result<Rows, WorkbookError> {
        let cells = self.cells.read();
        let grid = cells.get(&sheet);
        let start = range.start();
        let end = range.end();

        Ok((start.row..=end.row)
            .map(|row| {
                (start.column..=end.column)
                    .map(|column| {
                        grid.and_then(|g| g.get(&CellRef::new(column, row)))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect())
    }

    fn write_range(
        &self,
        sheet: SheetName,
        range: &CellRange,
        values: &[Vec<CellValue>],
    ) -> Result<(), WorkbookError> {
        range.check_fits(values)?;
        let start = range.start();

        let mut cells = self.cells.write();
        let grid = cells.entry(sheet).or_default();
        for (row, value_row) in (start.row..).zip(values) {
            for (column, value) in (start.column..).zip(value_row) {
                let at = CellRef::new(column, row);
                if value.is_blank() {
                    grid.remove(&at);
                } else {
                    grid.insert(at, value.clone());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(reference: &str) -> CellRange {
        CellRange::parse(reference).unwrap()
    }

    #[test]
    fn unwritten_cells_read_blank_with_exact_shape() {
        let workbook = MemoryWorkbook::new();
        let rows = workbook.read_range(SheetName::Input, &range("C5:K7")).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 9 && r.iter().all(CellValue::is_blank)));
    }

    #[test]
    fn write_then_read_round_trips_at_anchor() {
        let workbook = MemoryWorkbook::new();
        workbook
            .write_range(
                SheetName::Funds,
                &range("A4:B6"),
                &[vec!["Available Margin".into(), CellValue::Number(100.5)]],
            )
            .unwrap();

        assert_eq!(
            workbook.read_cell(SheetName::Funds, 2, 4).unwrap(),
            CellValue::Number(100.5)
        );
        assert!(workbook.read_cell(SheetName::Funds, 2, 5).unwrap().is_blank());
        // Sheets are independent
        assert!(workbook.read_cell(SheetName::Input, 2, 4).unwrap().is_blank());
    }

    #[test]
    fn blank_writes_clear_cells() {
        let workbook = MemoryWorkbook::new();
        workbook
            .write_cell(SheetName::Input, 1, 5, "NSE:INFY".into())
            .unwrap();
        assert_eq!(workbook.populated_cells().get(&SheetName::Input), Some(&1));

        workbook
            .write_cell(SheetName::Input, 1, 5, CellValue::Text("  ".into()))
            .unwrap();
        assert_eq!(workbook.populated_cells().get(&SheetName::Input), Some(&0));
    }

    #[test]
    fn oversized_writes_are_rejected() {
        let workbook = MemoryWorkbook::new();
        let err = workbook
            .write_range(
                SheetName::Input,
                &range("B5"),
                &[vec![1_i64.into(), 2_i64.into()]],
            )
            .unwrap_err();
        assert!(matches!(err, WorkbookError::Range(_)));
    }
}

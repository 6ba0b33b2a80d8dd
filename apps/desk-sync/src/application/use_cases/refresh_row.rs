//! Refresh Row Use Case
//!
//! On-demand refresh of one INPUT row: reconcile its subscription with
//! whatever column A now shows, then write quantity, price fields and a
//! timestamp.

use crate::application::ports::{BrokeragePort, TickFeedPort, WorkbookError, WorkbookPort};
use crate::application::session::{DeskSession, now_stamp};
use crate::domain::account::Position;
use crate::domain::market_data::PriceFields;
use crate::domain::sheet::layout::input;
use crate::domain::sheet::{CellRange, CellValue, SheetName, blank_row};
use crate::domain::subscription::RowNumber;
use crate::domain::symbol::{RowLabel, SymbolKey};

/// What a row refresh did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// The row holds no resolvable symbol; derived cells were cleared.
    Cleared,
    /// Derived cells were written for this symbol.
    Populated(SymbolKey),
}

/// Use case for refreshing a single INPUT row.
pub struct RefreshRowUseCase<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    session: DeskSession<B, F, W>,
}

impl<B, F, W> RefreshRowUseCase<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    /// Create a new `RefreshRowUseCase`.
    pub const fn new(session: DeskSession<B, F, W>) -> Self {
        Self { session }
    }

    /// Refresh `row` using `positions` for the quantity column.
    ///
    /// Repeating the call with the same market and position data writes the
    /// same cells.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when column A cannot be read or the derived
    /// cells cannot be written.
    pub async fn refresh(
        &self,
        row: RowNumber,
        positions: &[Position],
    ) -> Result<RowOutcome, WorkbookError> {
        let workbook = self.session.workbook();
        let label = RowLabel::classify(&workbook.read_cell(SheetName::Input, input::SYMBOL, row)?);
        let binding = self.session.binding_for(&label);
        self.session.assign_row(row, binding.clone());

        let Some(binding) = binding else {
            self.clear(row)?;
            return Ok(RowOutcome::Cleared);
        };

        let symbol = binding.symbol;
        let fields = self
            .session
            .price_fields(std::slice::from_ref(&symbol))
            .await
            .remove(&symbol)
            .unwrap_or_default();
        let quantity = positions
            .iter()
            .find(|p| p.symbol_key().as_ref() == Some(&symbol))
            .map_or(CellValue::Empty, |p| CellValue::from(p.quantity));

        self.write(row, quantity, &fields)?;
        Ok(RowOutcome::Populated(symbol))
    }

    fn write(
        &self,
        row: RowNumber,
        quantity: CellValue,
        fields: &PriceFields,
    ) -> Result<(), WorkbookError> {
        let workbook = self.session.workbook();
        workbook.write_cell(SheetName::Input, input::QUANTITY, row, quantity)?;
        workbook.write_range(
            SheetName::Input,
            &CellRange::row_span(row, input::PRICES_FIRST, input::PRICES_LAST),
            &[fields.to_cells()],
        )?;
        workbook.write_cell(SheetName::Input, input::TIMESTAMP, row, now_stamp().into())
    }

    fn clear(&self, row: RowNumber) -> Result<(), WorkbookError> {
        let workbook = self.session.workbook();
        workbook.write_cell(SheetName::Input, input::QUANTITY, row, CellValue::Empty)?;
        workbook.write_range(
            SheetName::Input,
            &CellRange::row_span(row, input::PRICES_FIRST, input::PRICES_LAST),
            &[blank_row(PriceFields::WIDTH)],
        )?;
        workbook.write_cell(SheetName::Input, input::TIMESTAMP, row, CellValue::Empty)
    }
}

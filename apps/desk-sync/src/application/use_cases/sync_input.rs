//! Sync Input Use Case
//!
//! Keeps the INPUT sheet current: live price refresh of every symbol row,
//! autofill of column A from holdings and positions, per-row order defaults
//! and reconciliation of ticker subscriptions against column A.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;

use crate::application::ports::{BrokeragePort, TickFeedPort, WorkbookError, WorkbookPort};
use crate::application::session::{DeskSession, now_stamp};
use crate::domain::account::{Holding, Position};
use crate::domain::market_data::PriceFields;
use crate::domain::orders::default_product;
use crate::domain::sheet::layout::{FIRST_ROW, data_row, input};
use crate::domain::sheet::{
    CellRange, CellValue, Rows, SheetName, blank_row, blank_rows, cell_at,
};
use crate::domain::symbol::{RowLabel, SectionMarker, SymbolKey};

const DEFAULT_VARIETY: &str = "regular";
const DEFAULT_VALIDITY: &str = "DAY";

/// Column `A` of every INPUT row.
fn symbol_column() -> CellRange {
    CellRange::column_span(input::SYMBOL, FIRST_ROW, input::LAST_ROW)
}

fn single_column(values: impl IntoIterator<Item = CellValue>) -> Rows {
    values.into_iter().map(|value| vec![value]).collect()
}

/// Per-symbol quantity and P&L, preferring positions over holdings.
#[derive(Debug, Default)]
struct AccountLookup {
    position: HashMap<SymbolKey, (i64, Decimal)>,
    holding: HashMap<SymbolKey, (i64, Decimal)>,
}

impl AccountLookup {
    fn new(positions: &[Position], holdings: &[Holding]) -> Self {
        Self {
            position: positions
                .iter()
                .filter_map(|p| Some((p.symbol_key()?, (p.quantity, p.pnl))))
                .collect(),
            holding: holdings
                .iter()
                .filter_map(|h| Some((h.symbol_key()?, (h.quantity, h.pnl))))
                .collect(),
        }
    }

    fn quantity(&self, symbol: &SymbolKey) -> CellValue {
        match self.position.get(symbol) {
            Some((quantity, _)) if *quantity != 0 => CellValue::from(*quantity),
            _ => self
                .holding
                .get(symbol)
                .map_or(CellValue::Empty, |(quantity, _)| CellValue::from(*quantity)),
        }
    }

    fn pnl(&self, symbol: &SymbolKey) -> CellValue {
        self.position
            .get(symbol)
            .or_else(|| self.holding.get(symbol))
            .map_or(CellValue::Empty, |(_, pnl)| CellValue::from(*pnl))
    }
}

/// Column A layout generated from the account: the holdings block, then the
/// positions block, each under its marker.
#[must_use]
pub fn generated_symbols(positions: &[Position], holdings: &[Holding]) -> Vec<String> {
    let mut seen = HashSet::new();
    let holding_symbols: Vec<SymbolKey> = holdings
        .iter()
        .filter_map(Holding::symbol_key)
        .filter(|symbol| seen.insert(symbol.clone()))
        .collect();
    let position_symbols: Vec<SymbolKey> = positions
        .iter()
        .filter(|p| !p.is_flat())
        .filter_map(Position::symbol_key)
        .filter(|symbol| seen.insert(symbol.clone()))
        .collect();

    let mut rows = Vec::with_capacity(holding_symbols.len() + position_symbols.len() + 2);
    if !holding_symbols.is_empty() {
        rows.push(SectionMarker::Holdings.as_str().to_string());
        rows.extend(holding_symbols.into_iter().map(String::from));
    }
    if !position_symbols.is_empty() {
        rows.push(SectionMarker::Portfolio.as_str().to_string());
        rows.extend(position_symbols.into_iter().map(String::from));
    }
    rows
}

/// Use case for INPUT sheet maintenance.
pub struct SyncInputUseCase<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    session: DeskSession<B, F, W>,
}

impl<B, F, W> SyncInputUseCase<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    /// Create a new `SyncInputUseCase`.
    pub const fn new(session: DeskSession<B, F, W>) -> Self {
        Self { session }
    }

    fn read_labels(&self) -> Result<Vec<RowLabel>, WorkbookError> {
        let column = self
            .session
            .workbook()
            .read_range(SheetName::Input, &symbol_column())?;
        Ok(column
            .iter()
            .map(|row| RowLabel::classify(row.first().unwrap_or(&CellValue::Empty)))
            .collect())
    }

    /// Rewrite quantity, price fields, P&L and timestamp for every row.
    ///
    /// Blank rows get blank outputs. Marker and non-symbol rows have `B:Y`
    /// cleared. Symbols the directory does not know get blank outputs.
    /// Returns the number of symbol rows written.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the sheet cannot be read or written.
    pub async fn refresh_prices(
        &self,
        positions: &[Position],
        holdings: &[Holding],
    ) -> Result<usize, WorkbookError> {
        let labels = self.read_labels()?;
        let workbook = self.session.workbook();

        let symbols: Vec<SymbolKey> = labels
            .iter()
            .filter_map(RowLabel::symbol)
            .filter(|symbol| self.session.directory().resolve(symbol).is_some())
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let fields = self.session.price_fields(&symbols).await;
        let account = AccountLookup::new(positions, holdings);
        let stamp = now_stamp();

        let mut quantities = Vec::with_capacity(labels.len());
        let mut prices = Vec::with_capacity(labels.len());
        let mut pnls = Vec::with_capacity(labels.len());
        let mut stamps = Vec::with_capacity(labels.len());
        let mut written = 0;

        for (index, label) in labels.iter().enumerate() {
            let resolved = label
                .symbol()
                .and_then(|symbol| fields.get(symbol).map(|f| (symbol, f)));
            if let Some((symbol, row_fields)) = resolved {
                quantities.push(account.quantity(symbol));
                prices.push(row_fields.to_cells());
                pnls.push(account.pnl(symbol));
                stamps.push(CellValue::from(stamp.as_str()));
                written += 1;
                continue;
            }

            if matches!(label, RowLabel::Marker(_) | RowLabel::Unrecognized) {
                let row = data_row(index);
                workbook.write_range(
                    SheetName::Input,
                    &CellRange::row_span(row, input::QUANTITY, input::WIDTH),
                    &[blank_row((input::WIDTH - 1) as usize)],
                )?;
            }
            quantities.push(CellValue::Empty);
            prices.push(blank_row(PriceFields::WIDTH));
            pnls.push(CellValue::Empty);
            stamps.push(CellValue::Empty);
        }

        let last = input::LAST_ROW;
        workbook.write_range(
            SheetName::Input,
            &CellRange::column_span(input::QUANTITY, FIRST_ROW, last),
            &single_column(quantities),
        )?;
        workbook.write_range(
            SheetName::Input,
            &CellRange::block(input::PRICES_FIRST, input::PRICES_LAST, FIRST_ROW, last),
            &prices,
        )?;
        workbook.write_range(
            SheetName::Input,
            &CellRange::column_span(input::TIMESTAMP, FIRST_ROW, last),
            &single_column(stamps),
        )?;
        workbook.write_range(
            SheetName::Input,
            &CellRange::column_span(input::PNL, FIRST_ROW, last),
            &single_column(pnls),
        )?;
        Ok(written)
    }

    /// Write the generated holdings and positions blocks into column A.
    ///
    /// With `clear_all` the whole input area (`A`, `B:K`, `Q:R`) is cleared
    /// and the full layout written, ending in a `MANUAL` marker. Otherwise
    /// only the rows above the existing `MANUAL` marker are rewritten, or
    /// just the generated block when there is no marker.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the sheet cannot be read or written.
    pub fn autofill(
        &self,
        positions: &[Position],
        holdings: &[Holding],
        clear_all: bool,
    ) -> Result<(), WorkbookError> {
        let workbook = self.session.workbook();
        let rows = input::ROWS as usize;
        let last = input::LAST_ROW;
        let generated = generated_symbols(positions, holdings);
        let manual = SectionMarker::Manual.as_str().to_string();

        let block: Vec<CellValue> = if clear_all {
            workbook.write_range(
                SheetName::Input,
                &CellRange::block(input::QUANTITY, input::PRICES_LAST, FIRST_ROW, last),
                &blank_rows(rows, (input::PRICES_LAST - input::QUANTITY + 1) as usize),
            )?;
            workbook.write_range(
                SheetName::Input,
                &CellRange::block(input::PNL, input::TIMESTAMP, FIRST_ROW, last),
                &blank_rows(rows, 2),
            )?;

            let mut block: Vec<CellValue> = generated
                .into_iter()
                .chain(std::iter::once(manual))
                .map(CellValue::from)
                .collect();
            block.resize(rows, CellValue::Empty);
            block
        } else {
            let marker_index = self
                .read_labels()?
                .iter()
                .position(|label| *label == RowLabel::Marker(SectionMarker::Manual));
            match marker_index {
                Some(index) => {
                    let mut block: Vec<CellValue> = generated
                        .into_iter()
                        .chain(std::iter::once(manual))
                        .map(CellValue::from)
                        .collect();
                    // Blank any leftover rows of a longer previous block
                    if block.len() < index + 1 {
                        block.resize(index + 1, CellValue::Empty);
                    }
                    block
                }
                None => generated.into_iter().map(CellValue::from).collect(),
            }
        };

        if block.len() > rows {
            tracing::warn!(
                generated = block.len(),
                rows,
                "Autofill exceeds the INPUT sheet, truncating"
            );
        }
        let block: Vec<CellValue> = block.into_iter().take(rows).collect();
        if block.is_empty() {
            return Ok(());
        }
        workbook.write_range(SheetName::Input, &symbol_column(), &single_column(block))
    }

    /// Fill blank variety, product and validity cells on symbol rows.
    ///
    /// Returns the number of cells written.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the sheet cannot be read or written.
    pub fn apply_defaults(&self) -> Result<usize, WorkbookError> {
        let workbook = self.session.workbook();
        let rows = workbook.read_range(
            SheetName::Input,
            &CellRange::block(input::SYMBOL, input::VALIDITY, FIRST_ROW, input::LAST_ROW),
        )?;

        let mut written = 0;
        for (index, row) in rows.iter().enumerate() {
            let label = RowLabel::classify(cell_at(row, input::SYMBOL));
            let Some(symbol) = label.symbol() else {
                continue;
            };
            let target = data_row(index);
            let defaults = [
                (input::VARIETY, Some(DEFAULT_VARIETY)),
                (input::PRODUCT, default_product(symbol.exchange())),
                (input::VALIDITY, Some(DEFAULT_VALIDITY)),
            ];
            for (column, value) in defaults {
                if let Some(value) = value
                    && cell_at(row, column).is_blank()
                {
                    workbook.write_cell(SheetName::Input, column, target, value.into())?;
                    written += 1;
                }
            }
        }
        Ok(written)
    }

    /// Reconcile ticker subscriptions against the whole of column A.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when column A cannot be read.
    pub fn reconcile_subscriptions(&self) -> Result<(), WorkbookError> {
        let labels = self.read_labels()?;
        let bindings = labels
            .iter()
            .enumerate()
            .map(|(index, label)| (data_row(index), self.session.binding_for(label)));
        self.session.reconcile_rows(bindings);
        Ok(())
    }
}

//! Write Account Use Case
//!
//! Rewrites the Portfolio, Holdings, Orders and Funds sheets from the
//! brokerage's account state.

use rust_decimal::Decimal;

use crate::application::ports::{BrokeragePort, TickFeedPort, WorkbookError, WorkbookPort};
use crate::application::session::{DeskSession, last_updated_stamp};
use crate::domain::account::{Holding, OrderRecord, Position};
use crate::domain::market_data::TickSnapshot;
use crate::domain::sheet::layout::{FIRST_ROW, STAMP_ROW, funds, holdings, orders, portfolio};
use crate::domain::sheet::{CellRange, CellValue, Rows, SheetName, blank_rows};
use crate::domain::symbol::SymbolKey;
use crate::infrastructure::metrics;

/// Live last price from the tick cache, else the snapshot's own.
fn live_price(
    ticks: &TickSnapshot,
    symbol: Option<SymbolKey>,
    fallback: Decimal,
) -> CellValue {
    symbol
        .and_then(|s| ticks.get(&s).map(|tick| tick.last_price))
        .unwrap_or(fallback)
        .into()
}

/// Portfolio row: token, symbol, exchange, qty, avg, LTP, P&L, realised, M2M.
fn portfolio_row(position: &Position, ticks: &TickSnapshot) -> Vec<CellValue> {
    vec![
        position.instrument_token.into(),
        position.tradingsymbol.to_uppercase().into(),
        position.exchange.to_uppercase().into(),
        position.quantity.into(),
        position.average_price.into(),
        live_price(ticks, position.symbol_key(), position.last_price),
        position.pnl.into(),
        position.realised.into(),
        position.m2m.into(),
    ]
}

/// Holdings row: symbol, exchange, ISIN, qty, T1 qty, avg, LTP, close, P&L,
/// day change, day change %.
fn holding_row(holding: &Holding, ticks: &TickSnapshot) -> Vec<CellValue> {
    vec![
        holding.tradingsymbol.to_uppercase().into(),
        holding.exchange.to_uppercase().into(),
        holding.isin.as_str().into(),
        holding.quantity.into(),
        holding.t1_quantity.into(),
        holding.average_price.into(),
        live_price(ticks, holding.symbol_key(), holding.last_price),
        holding.close_price.into(),
        holding.pnl.into(),
        holding.day_change.into(),
        holding.day_change_percentage.into(),
    ]
}

/// Orders row, `A:P`.
fn order_row(order: &OrderRecord) -> Vec<CellValue> {
    vec![
        order.order_id.as_str().into(),
        order.variety.as_str().into(),
        order.status.as_str().into(),
        order.tradingsymbol.as_str().into(),
        order.exchange.as_str().into(),
        order.order_type.as_str().into(),
        order.product.as_str().into(),
        order.transaction_type.as_str().into(),
        order.quantity.into(),
        order.price.into(),
        order.trigger_price.into(),
        order.average_price.into(),
        order.pending_quantity.into(),
        order.filled_quantity.into(),
        order.order_timestamp.clone().into(),
        order.parent_order_id.clone().into(),
    ]
}

/// Use case for the account sheets.
pub struct WriteAccountUseCase<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    session: DeskSession<B, F, W>,
}

impl<B, F, W> WriteAccountUseCase<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    /// Create a new `WriteAccountUseCase`.
    pub const fn new(session: DeskSession<B, F, W>) -> Self {
        Self { session }
    }

    /// Write `rows` from `A2`, blank the rest of the table, stamp row 1.
    fn write_table(
        &self,
        sheet: SheetName,
        mut rows: Rows,
        width: u32,
        capacity: u32,
        stamp_column: u32,
    ) -> Result<usize, WorkbookError> {
        let capacity_rows = capacity as usize;
        if rows.len() > capacity_rows {
            tracing::warn!(
                sheet = %sheet,
                rows = rows.len(),
                capacity,
                "Table exceeds sheet capacity, truncating"
            );
            rows.truncate(capacity_rows);
        }
        let written = rows.len();
        rows.extend(blank_rows(capacity_rows - written, width as usize));

        let workbook = self.session.workbook();
        workbook.write_range(
            sheet,
            &CellRange::block(1, width, FIRST_ROW, FIRST_ROW + capacity - 1),
            &rows,
        )?;
        workbook.write_cell(sheet, stamp_column, STAMP_ROW, last_updated_stamp().into())?;
        Ok(written)
    }

    /// Rewrite the Portfolio sheet with non-flat positions.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the sheet cannot be written.
    pub fn write_portfolio(&self, positions: &[Position]) -> Result<usize, WorkbookError> {
        let ticks = self.session.ticks().snapshot();
        let rows = positions
            .iter()
            .filter(|p| !p.is_flat())
            .map(|p| portfolio_row(p, &ticks))
            .collect();
        self.write_table(
            SheetName::Portfolio,
            rows,
            portfolio::WIDTH,
            portfolio::ROWS,
            portfolio::STAMP_COLUMN,
        )
    }

    /// Rewrite the Holdings sheet.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the sheet cannot be written.
    pub fn write_holdings(&self, holdings: &[Holding]) -> Result<usize, WorkbookError> {
        let ticks = self.session.ticks().snapshot();
        let rows = holdings.iter().map(|h| holding_row(h, &ticks)).collect();
        self.write_table(
            SheetName::Holdings,
            rows,
            holdings::WIDTH,
            holdings::ROWS,
            holdings::STAMP_COLUMN,
        )
    }

    /// Rewrite the Orders sheet from the day's order book.
    ///
    /// With `clear_all` the order area is blanked first. A failed fetch
    /// leaves the sheet as it is.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the sheet cannot be written.
    pub async fn write_orders(&self, clear_all: bool) -> Result<usize, WorkbookError> {
        if clear_all {
            self.session.workbook().write_range(
                SheetName::Orders,
                &CellRange::block(1, orders::WIDTH, FIRST_ROW, FIRST_ROW + orders::CLEAR_ROWS - 1),
                &blank_rows(orders::CLEAR_ROWS as usize, orders::WIDTH as usize),
            )?;
        }

        let book = match self.session.broker().orders().await {
            Ok(book) => book,
            Err(e) => {
                metrics::record_brokerage_error("orders");
                tracing::warn!(error = %e, "Failed to fetch orders");
                return Ok(0);
            }
        };

        let rows = book.iter().map(order_row).collect();
        self.write_table(
            SheetName::Orders,
            rows,
            orders::WIDTH,
            orders::ROWS,
            orders::STAMP_COLUMN,
        )
    }

    /// Rewrite the Funds margin summary.
    ///
    /// On failure `B4` is set to `Timeout` or `Error`.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the sheet cannot be written.
    pub async fn write_funds(&self) -> Result<(), WorkbookError> {
        let workbook = self.session.workbook();
        let margins = match self.session.broker().margins().await {
            Ok(margins) => margins,
            Err(e) => {
                metrics::record_brokerage_error("margins");
                tracing::warn!(error = %e, "Failed to fetch margins");
                let marker = if e.is_timeout() { "Timeout" } else { "Error" };
                return workbook.write_cell(
                    SheetName::Funds,
                    funds::VALUE_COLUMN,
                    funds::FIRST_ROW,
                    marker.into(),
                );
            }
        };

        let equity = margins.equity.unwrap_or_default();
        let rows: Rows = vec![
            vec!["Available Margin".into(), equity.net.into()],
            vec!["Used Margin".into(), equity.utilised.debits.into()],
            vec!["Available Cash".into(), equity.available.cash.into()],
        ];
        workbook.write_range(
            SheetName::Funds,
            &CellRange::block(1, funds::VALUE_COLUMN, funds::FIRST_ROW, funds::FIRST_ROW + 2),
            &rows,
        )?;
        workbook.write_cell(
            SheetName::Funds,
            funds::STAMP_COLUMN,
            STAMP_ROW,
            last_updated_stamp().into(),
        )
    }
}

//! Manage Orders Use Case
//!
//! Places orders requested on the INPUT sheet, tracks their status, and
//! applies modify/cancel instructions from the Orders sheet.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::application::ports::{BrokeragePort, TickFeedPort, WorkbookError, WorkbookPort};
use crate::application::session::DeskSession;
use crate::domain::orders::{
    Amendment, EntryDecision, cancel_error_text, entry_status_for, modified_text,
    modify_error_text, placed_status,
};
use crate::domain::sheet::layout::{FIRST_ROW, data_row, input, orders};
use crate::domain::sheet::{CellRange, CellValue, SheetName, blank_row};
use crate::domain::subscription::RowNumber;
use crate::infrastructure::metrics::{self, OrderAction};

/// Counts from one pass over the INPUT order-entry columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryReport {
    /// Orders placed.
    pub placed: usize,
    /// Placements that failed or were malformed.
    pub failed: usize,
    /// Tracked orders whose status was refreshed.
    pub tracked: usize,
}

/// Counts from one pass over the Orders instruction columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmendmentReport {
    /// Successful cancellations.
    pub cancelled: usize,
    /// Successful modifications.
    pub modified: usize,
    /// Instructions that were refused or failed.
    pub rejected: usize,
}

/// Use case for order placement, tracking and amendment.
pub struct ManageOrdersUseCase<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    session: DeskSession<B, F, W>,
    placed: Mutex<HashMap<RowNumber, String>>,
}

impl<B, F, W> ManageOrdersUseCase<B, F, W>
where
    B: BrokeragePort,
    F: TickFeedPort,
    W: WorkbookPort,
{
    /// Create a new `ManageOrdersUseCase`.
    pub fn new(session: DeskSession<B, F, W>) -> Self {
        Self {
            session,
            placed: Mutex::new(HashMap::new()),
        }
    }

    /// Order id placed from `row` during this session.
    pub fn placed_order(&self, row: RowNumber) -> Option<String> {
        self.placed.lock().get(&row).cloned()
    }

    fn write_entry_status(&self, row: RowNumber, status: String) -> Result<(), WorkbookError> {
        self.session
            .workbook()
            .write_cell(SheetName::Input, input::ENTRY_STATUS, row, status.into())
    }

    fn clear_signal(&self, row: RowNumber) -> Result<(), WorkbookError> {
        self.session
            .workbook()
            .write_cell(SheetName::Input, input::ENTRY_SIGNAL, row, CellValue::Empty)
    }

    /// Place signalled INPUT rows and refresh the status of tracked ones.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the sheet cannot be read or written.
    pub async fn process_entries(&self) -> Result<EntryReport, WorkbookError> {
        let rows = self.session.workbook().read_range(
            SheetName::Input,
            &CellRange::block(input::SYMBOL, input::WIDTH, FIRST_ROW, input::LAST_ROW),
        )?;

        let mut report = EntryReport::default();
        for (index, cells) in rows.iter().enumerate() {
            let row = data_row(index);
            match EntryDecision::from_row(cells) {
                EntryDecision::Place(request) => {
                    match self.session.broker().place_order(&request).await {
                        Ok(order_id) => {
                            tracing::info!(
                                row,
                                order_id = %order_id,
                                exchange = %request.exchange,
                                symbol = %request.tradingsymbol,
                                side = request.transaction_type.as_str(),
                                quantity = request.quantity,
                                "Order placed"
                            );
                            metrics::record_order(OrderAction::Place, true);
                            self.write_entry_status(row, placed_status(&order_id))?;
                            self.placed.lock().insert(row, order_id);
                            report.placed += 1;
                        }
                        Err(e) => {
                            tracing::warn!(row, error = %e, "Order placement failed");
                            metrics::record_order(OrderAction::Place, false);
                            self.write_entry_status(row, format!("ERROR: {e}"))?;
                            report.failed += 1;
                        }
                    }
                    self.clear_signal(row)?;
                }
                EntryDecision::Invalid(message) => {
                    tracing::warn!(row, reason = %message, "Order entry rejected");
                    self.write_entry_status(row, format!("ERROR: {message}"))?;
                    self.clear_signal(row)?;
                    report.failed += 1;
                }
                EntryDecision::Track { order_id } => {
                    let Some(order_id) = self.placed_order(row).or(order_id) else {
                        continue;
                    };
                    if self.track(row, &order_id).await? {
                        report.tracked += 1;
                    }
                }
                EntryDecision::Idle => {}
            }
        }
        Ok(report)
    }

    async fn track(&self, row: RowNumber, order_id: &str) -> Result<bool, WorkbookError> {
        match self.session.broker().order_history(order_id).await {
            Ok(history) => {
                let Some(latest) = history.last() else {
                    return Ok(false);
                };
                let status = entry_status_for(&latest.status, latest.filled_quantity);
                self.write_entry_status(row, status)?;
                Ok(true)
            }
            Err(e) if e.is_transient() => {
                metrics::record_brokerage_error("order_history");
                tracing::debug!(row, order_id, error = %e, "Order history unavailable");
                Ok(false)
            }
            Err(e) => {
                metrics::record_brokerage_error("order_history");
                self.write_entry_status(row, format!("ERROR: {e}"))?;
                Ok(false)
            }
        }
    }

    /// Apply modify and cancel instructions from the Orders sheet.
    ///
    /// # Errors
    ///
    /// Returns `WorkbookError` when the sheet cannot be read or written.
    pub async fn process_amendments(&self) -> Result<AmendmentReport, WorkbookError> {
        let workbook = self.session.workbook();
        let rows = workbook.read_range(
            SheetName::Orders,
            &CellRange::block(
                orders::ORDER_ID,
                orders::INSTRUCTION_WIDTH,
                FIRST_ROW,
                FIRST_ROW + orders::ROWS - 1,
            ),
        )?;

        let mut report = AmendmentReport::default();
        for (index, cells) in rows.iter().enumerate() {
            let row = data_row(index);
            let Some(amendment) = Amendment::from_row(cells) else {
                continue;
            };

            let (column, text) = match amendment {
                Amendment::Cancel(request) => {
                    match self.session.broker().cancel_order(&request).await {
                        Ok(_) => {
                            tracing::info!(row, order_id = %request.order_id, "Order cancelled");
                            metrics::record_order(OrderAction::Cancel, true);
                            report.cancelled += 1;
                            (orders::CANCEL_FLAG, "Cancelled".to_string())
                        }
                        Err(e) => {
                            tracing::warn!(row, order_id = %request.order_id, error = %e, "Cancel failed");
                            metrics::record_order(OrderAction::Cancel, false);
                            report.rejected += 1;
                            (orders::CANCEL_FLAG, cancel_error_text(&e.to_string()))
                        }
                    }
                }
                Amendment::Modify(request) => {
                    match self.session.broker().modify_order(&request).await {
                        Ok(order_id) => {
                            tracing::info!(row, order_id = %order_id, "Order modified");
                            metrics::record_order(OrderAction::Modify, true);
                            workbook.write_range(
                                SheetName::Orders,
                                &CellRange::row_span(
                                    row,
                                    orders::NEW_PRICE,
                                    orders::NEW_DISCLOSED_QTY,
                                ),
                                &[blank_row(
                                    (orders::NEW_DISCLOSED_QTY - orders::NEW_PRICE + 1) as usize,
                                )],
                            )?;
                            report.modified += 1;
                            (orders::MODIFY_FLAG, modified_text(&order_id))
                        }
                        Err(e) => {
                            tracing::warn!(row, order_id = %request.order_id, error = %e, "Modify failed");
                            metrics::record_order(OrderAction::Modify, false);
                            report.rejected += 1;
                            (orders::MODIFY_FLAG, modify_error_text(&e.to_string()))
                        }
                    }
                }
                Amendment::InvalidModify(message) => {
                    report.rejected += 1;
                    (orders::MODIFY_FLAG, modify_error_text(&message))
                }
                Amendment::NotCancellable => {
                    report.rejected += 1;
                    (orders::CANCEL_FLAG, "Not Cancellable".to_string())
                }
                Amendment::NotModifiable => {
                    report.rejected += 1;
                    (orders::MODIFY_FLAG, "Not Modifiable".to_string())
                }
            };
            workbook.write_cell(SheetName::Orders, column, row, text.into())?;
        }
        Ok(report)
    }
}

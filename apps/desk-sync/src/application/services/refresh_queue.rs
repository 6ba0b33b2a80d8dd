//! Refresh Request Queue
//!
//! Unbounded FIFO between the HTTP handler (producer) and the sync loop
//! (consumer). No deduplication: repeated requests for a row are each
//! processed, and each rewrites the same cells.

use tokio::sync::mpsc;

use crate::domain::sheet::layout::{FIRST_ROW, input};
use crate::domain::subscription::RowNumber;

/// A request to refresh one INPUT row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Row to refresh.
    pub row: RowNumber,
    /// Symbol the macro layer believed the row held. Informational only;
    /// the row's current column A value is what gets processed.
    pub symbol_hint: Option<String>,
}

/// Errors from enqueueing a refresh request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshQueueError {
    /// Row is a header row or out of range.
    #[error("bad row {0}")]
    BadRow(i64),

    /// The sync loop has stopped.
    #[error("refresh queue closed")]
    Closed,
}

/// Create a connected sender/receiver pair.
#[must_use]
pub fn refresh_queue() -> (RefreshSender, RefreshReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RefreshSender { tx }, RefreshReceiver { rx })
}

/// Producer half, cloned into the HTTP handler.
#[derive(Debug, Clone)]
pub struct RefreshSender {
    tx: mpsc::UnboundedSender<RefreshRequest>,
}

impl RefreshSender {
    /// Enqueue a refresh of `row`. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns `RefreshQueueError::BadRow` when `row` is outside the INPUT
    /// symbol rows, and `RefreshQueueError::Closed` when the consumer is gone.
    pub fn enqueue(&self, row: i64, symbol_hint: Option<String>) -> Result<(), RefreshQueueError> {
        let row = RowNumber::try_from(row)
            .ok()
            .filter(|r| (FIRST_ROW..=input::LAST_ROW).contains(r))
            .ok_or(RefreshQueueError::BadRow(row))?;
        self.tx
            .send(RefreshRequest { row, symbol_hint })
            .map_err(|_| RefreshQueueError::Closed)
    }
}

/// Consumer half, owned by the sync loop.
#[derive(Debug)]
pub struct RefreshReceiver {
    rx: mpsc::UnboundedReceiver<RefreshRequest>,
}

impl RefreshReceiver {
    /// Take the oldest pending request, if any.
    pub fn try_next(&mut self) -> Option<RefreshRequest> {
        self.rx.try_recv().ok()
    }

    /// Number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_come_out_in_order() {
        let (tx, mut rx) = refresh_queue();
        tx.enqueue(5, Some("NSE:INFY".to_string())).unwrap();
        tx.enqueue(3, None).unwrap();
        tx.enqueue(5, Some("NSE:INFY".to_string())).unwrap();

        assert_eq!(rx.len(), 3);
        assert_eq!(rx.try_next().map(|r| r.row), Some(5));
        assert_eq!(rx.try_next().map(|r| r.row), Some(3));
        assert_eq!(rx.try_next().map(|r| r.row), Some(5));
        assert!(rx.try_next().is_none());
    }

    #[test]
    fn header_and_negative_rows_are_rejected() {
        let (tx, rx) = refresh_queue();
        assert_eq!(tx.enqueue(1, None), Err(RefreshQueueError::BadRow(1)));
        assert_eq!(tx.enqueue(0, None), Err(RefreshQueueError::BadRow(0)));
        assert_eq!(tx.enqueue(-4, None), Err(RefreshQueueError::BadRow(-4)));
        assert!(rx.is_empty());
    }

    #[test]
    fn rows_past_the_input_area_are_rejected() {
        let (tx, mut rx) = refresh_queue();
        tx.enqueue(i64::from(input::LAST_ROW), None).unwrap();
        assert_eq!(tx.enqueue(202, None), Err(RefreshQueueError::BadRow(202)));
        assert_eq!(
            tx.enqueue(i64::from(u32::MAX) + 1, None),
            Err(RefreshQueueError::BadRow(4_294_967_296))
        );
        assert_eq!(rx.try_next().map(|r| r.row), Some(201));
        assert!(rx.is_empty());
    }

    #[test]
    fn closed_consumer_is_reported() {
        let (tx, rx) = refresh_queue();
        drop(rx);
        assert_eq!(tx.enqueue(2, None), Err(RefreshQueueError::Closed));
    }
}

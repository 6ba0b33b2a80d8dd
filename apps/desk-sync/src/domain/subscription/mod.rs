//! Row Subscription Tracking
//!
//! Maps each INPUT row to the symbol it currently displays and keeps a
//! reference count per instrument token, so the streaming connection holds
//! exactly one subscription per symbol no matter how many rows show it.
//!
//! # Invariant
//!
//! A token is active iff at least one row is bound to it. Rebinding a row
//! releases its previous token (unsubscribing only when no other row still
//! references it) and acquires the new one (subscribing only on the first
//! reference).

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

use super::symbol::{InstrumentToken, SymbolKey};

// =============================================================================
// Types
// =============================================================================

/// Spreadsheet row number (1-based, data rows start at 2).
pub type RowNumber = u32;

/// A row's resolved symbol and its streaming token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBinding {
    /// Symbol shown in the row.
    pub symbol: SymbolKey,
    /// Token the symbol resolved to.
    pub token: InstrumentToken,
}

impl RowBinding {
    /// Bind `symbol` to `token`.
    #[must_use]
    pub const fn new(symbol: SymbolKey, token: InstrumentToken) -> Self {
        Self { symbol, token }
    }
}

// =============================================================================
// Subscription Changes
// =============================================================================

/// Changes to apply on the streaming connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionChanges {
    /// Tokens to subscribe (in full mode), ascending.
    pub subscribe: Vec<InstrumentToken>,
    /// Tokens to unsubscribe, ascending.
    pub unsubscribe: Vec<InstrumentToken>,
}

impl SubscriptionChanges {
    /// Check if there are any changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }

    fn between(before: &BTreeSet<InstrumentToken>, after: &BTreeSet<InstrumentToken>) -> Self {
        Self {
            subscribe: after.difference(before).copied().collect(),
            unsubscribe: before.difference(after).copied().collect(),
        }
    }
}

// =============================================================================
// Tracker State
// =============================================================================

#[derive(Debug, Default)]
struct TrackerState {
    rows: HashMap<RowNumber, RowBinding>,
    token_refcount: HashMap<InstrumentToken, usize>,
}

impl TrackerState {
    fn active(&self) -> BTreeSet<InstrumentToken> {
        self.token_refcount.keys().copied().collect()
    }

    fn bind(&mut self, row: RowNumber, binding: Option<RowBinding>) {
        if self.rows.get(&row) == binding.as_ref() {
            return;
        }

        if let Some(previous) = self.rows.remove(&row) {
            self.release(previous.token);
        }

        if let Some(binding) = binding {
            *self.token_refcount.entry(binding.token).or_insert(0) += 1;
            self.rows.insert(row, binding);
        }
    }

    fn release(&mut self, token: InstrumentToken) {
        if let Some(refcount) = self.token_refcount.get_mut(&token) {
            *refcount = refcount.saturating_sub(1);
            if *refcount == 0 {
                self.token_refcount.remove(&token);
            }
        }
    }
}

// =============================================================================
// Row Subscription Tracker
// =============================================================================

/// Thread-safe row → symbol tracker with per-token reference counts.
///
/// # Example
///
/// ```rust
/// use desk_sync::domain::subscription::{RowBinding, RowSubscriptionTracker};
/// use desk_sync::domain::symbol::{InstrumentToken, SymbolKey};
///
/// let tracker = RowSubscriptionTracker::new();
/// let infy = RowBinding::new(SymbolKey::parse("NSE:INFY").unwrap(), InstrumentToken::new(408_065));
///
/// // First row showing INFY subscribes
/// let changes = tracker.assign(5, Some(infy.clone()));
/// assert_eq!(changes.subscribe, vec![InstrumentToken::new(408_065)]);
///
/// // A second row showing INFY does not
/// assert!(tracker.assign(9, Some(infy)).is_empty());
///
/// // Clearing one row keeps the subscription alive for the other
/// assert!(tracker.assign(5, None).is_empty());
///
/// // Clearing the last row releases it
/// let changes = tracker.assign(9, None);
/// assert_eq!(changes.unsubscribe, vec![InstrumentToken::new(408_065)]);
/// ```
#[derive(Debug, Default)]
pub struct RowSubscriptionTracker {
    state: RwLock<TrackerState>,
}

impl RowSubscriptionTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what `row` now shows (`None` for a cleared or unresolvable row).
    ///
    /// Returns the subscription changes this causes.
    pub fn assign(&self, row: RowNumber, binding: Option<RowBinding>) -> SubscriptionChanges {
        self.reconcile([(row, binding)])
    }

    /// Record a batch of rows at once.
    ///
    /// Changes are computed against the state before the whole batch, so a
    /// symbol moving between rows in the same batch causes no churn.
    pub fn reconcile<I>(&self, rows: I) -> SubscriptionChanges
    where
        I: IntoIterator<Item = (RowNumber, Option<RowBinding>)>,
    {
        let mut state = self.state.write();
        let before = state.active();
        for (row, binding) in rows {
            state.bind(row, binding);
        }
        SubscriptionChanges::between(&before, &state.active())
    }

    /// Symbol currently recorded for `row`.
    #[must_use]
    pub fn row_symbol(&self, row: RowNumber) -> Option<SymbolKey> {
        self.state.read().rows.get(&row).map(|b| b.symbol.clone())
    }

    /// Rows currently showing `token`, ascending.
    #[must_use]
    pub fn rows_for(&self, token: InstrumentToken) -> Vec<RowNumber> {
        let state = self.state.read();
        let mut rows: Vec<_> = state
            .rows
            .iter()
            .filter(|(_, binding)| binding.token == token)
            .map(|(row, _)| *row)
            .collect();
        rows.sort_unstable();
        rows
    }

    /// Whether any row references `token`.
    #[must_use]
    pub fn is_active(&self, token: InstrumentToken) -> bool {
        self.state.read().token_refcount.contains_key(&token)
    }

    /// All tokens with at least one row, ascending.
    #[must_use]
    pub fn active_tokens(&self) -> Vec<InstrumentToken> {
        self.state.read().active().into_iter().collect()
    }

    /// Tracker statistics.
    #[must_use]
    pub fn stats(&self) -> SubscriptionStats {
        let state = self.state.read();
        SubscriptionStats {
            bound_rows: state.rows.len(),
            active_tokens: state.token_refcount.len(),
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of tracker counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SubscriptionStats {
    /// Rows bound to a symbol.
    pub bound_rows: usize,
    /// Distinct tokens referenced.
    pub active_tokens: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(symbol: &str, token: u32) -> Option<RowBinding> {
        Some(RowBinding::new(
            SymbolKey::parse(symbol).unwrap(),
            InstrumentToken::new(token),
        ))
    }

    fn tokens(raw: &[u32]) -> Vec<InstrumentToken> {
        raw.iter().copied().map(InstrumentToken::new).collect()
    }

    #[test]
    fn first_row_subscribes() {
        let tracker = RowSubscriptionTracker::new();

        let changes = tracker.assign(5, binding("NSE:INFY", 12345));

        assert_eq!(changes.subscribe, tokens(&[12345]));
        assert!(changes.unsubscribe.is_empty());
        assert_eq!(
            tracker.row_symbol(5).map(|s| s.to_string()),
            Some("NSE:INFY".to_string())
        );
    }

    #[test]
    fn same_symbol_twice_in_one_row_is_a_no_op() {
        let tracker = RowSubscriptionTracker::new();
        tracker.assign(5, binding("NSE:INFY", 12345));

        assert!(tracker.assign(5, binding("NSE:INFY", 12345)).is_empty());
        assert_eq!(tracker.stats().active_tokens, 1);
    }

    #[test]
    fn changing_symbol_swaps_tokens() {
        let tracker = RowSubscriptionTracker::new();
        tracker.assign(5, binding("NSE:INFY", 12345));

        let changes = tracker.assign(5, binding("NSE:TCS", 67890));

        assert_eq!(changes.subscribe, tokens(&[67890]));
        assert_eq!(changes.unsubscribe, tokens(&[12345]));
        assert!(!tracker.is_active(InstrumentToken::new(12345)));
    }

    #[test]
    fn shared_symbol_survives_partial_clear() {
        let tracker = RowSubscriptionTracker::new();
        assert!(!tracker.assign(3, binding("NSE:INFY", 12345)).is_empty());
        assert!(tracker.assign(7, binding("NSE:INFY", 12345)).is_empty());

        assert!(tracker.assign(3, None).is_empty());
        assert_eq!(tracker.rows_for(InstrumentToken::new(12345)), vec![7]);

        let changes = tracker.assign(7, None);
        assert_eq!(changes.unsubscribe, tokens(&[12345]));
        assert_eq!(tracker.stats(), SubscriptionStats::default());
    }

    #[test]
    fn clearing_unbound_row_is_a_no_op() {
        let tracker = RowSubscriptionTracker::new();
        assert!(tracker.assign(4, None).is_empty());
    }

    #[test]
    fn reconcile_moves_without_churn() {
        let tracker = RowSubscriptionTracker::new();
        tracker.assign(3, binding("NSE:INFY", 12345));

        // INFY shifts from row 3 to row 5 in one pass
        let changes = tracker.reconcile([
            (3, binding("NSE:SBIN", 779_521)),
            (5, binding("NSE:INFY", 12345)),
        ]);

        assert_eq!(changes.subscribe, tokens(&[779_521]));
        assert!(changes.unsubscribe.is_empty());
        assert_eq!(tracker.active_tokens(), tokens(&[12345, 779_521]));
    }

    #[test]
    fn reconcile_reports_sorted_changes() {
        let tracker = RowSubscriptionTracker::new();
        let changes = tracker.reconcile([
            (2, binding("NSE:TCS", 300)),
            (3, binding("NSE:INFY", 100)),
            (4, binding("NSE:SBIN", 200)),
        ]);
        assert_eq!(changes.subscribe, tokens(&[100, 200, 300]));

        let changes = tracker.reconcile([(2, None), (3, None), (4, None)]);
        assert_eq!(changes.unsubscribe, tokens(&[100, 200, 300]));
    }
}

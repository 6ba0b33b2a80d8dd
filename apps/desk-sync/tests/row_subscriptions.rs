//! Row Subscription Integration Tests
//!
//! Reference counting across arbitrary row edits, and the subscribe /
//! unsubscribe traffic a session pushes to the feed.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use common::{Desk, FakeFeed, INFY_TOKEN, SBIN_TOKEN, TCS_TOKEN, tokens};
use desk_sync::domain::subscription::{RowBinding, RowNumber, RowSubscriptionTracker};
use desk_sync::domain::symbol::{InstrumentToken, RowLabel, SymbolKey};
use desk_sync::domain::sheet::CellValue;

const SYMBOLS: [(&str, u32); 4] = [
    ("NSE:INFY", 100),
    ("NSE:TCS", 200),
    ("NSE:SBIN", 300),
    ("NFO:NIFTY25JANFUT", 400),
];

fn edit() -> impl Strategy<Value = (RowNumber, Option<usize>)> {
    (2u32..12, proptest::option::of(0..SYMBOLS.len()))
}

fn binding(index: usize) -> RowBinding {
    let (symbol, token) = SYMBOLS[index];
    RowBinding::new(SymbolKey::parse(symbol).unwrap(), InstrumentToken::new(token))
}

proptest! {
    #[test]
    fn active_tokens_match_bound_rows(edits in proptest::collection::vec(edit(), 1..64)) {
        let tracker = RowSubscriptionTracker::new();
        let mut rows: HashMap<RowNumber, usize> = HashMap::new();
        let mut streamed: BTreeSet<InstrumentToken> = BTreeSet::new();

        for (row, choice) in edits {
            let changes = tracker.assign(row, choice.map(binding));
            match choice {
                Some(index) => rows.insert(row, index),
                None => rows.remove(&row),
            };

            for token in &changes.unsubscribe {
                prop_assert!(streamed.remove(token), "unsubscribed a token never subscribed");
            }
            for token in &changes.subscribe {
                prop_assert!(streamed.insert(*token), "subscribed a token twice");
            }

            let expected: BTreeSet<InstrumentToken> =
                rows.values().map(|i| binding(*i).token).collect();
            prop_assert_eq!(&streamed, &expected);
            prop_assert_eq!(tracker.active_tokens(), expected.iter().copied().collect::<Vec<_>>());
            prop_assert_eq!(tracker.stats().bound_rows, rows.len());
        }
    }

    #[test]
    fn batch_reconcile_equals_net_effect(
        before in proptest::collection::vec(edit(), 0..32),
        batch in proptest::collection::vec(edit(), 0..32),
    ) {
        let tracker = RowSubscriptionTracker::new();
        for (row, choice) in &before {
            tracker.assign(*row, choice.map(binding));
        }
        let prior: BTreeSet<_> = tracker.active_tokens().into_iter().collect();

        let changes = tracker.reconcile(batch.iter().map(|(row, choice)| (*row, choice.map(binding))));
        let after: BTreeSet<_> = tracker.active_tokens().into_iter().collect();

        let subscribed: BTreeSet<_> = changes.subscribe.iter().copied().collect();
        let unsubscribed: BTreeSet<_> = changes.unsubscribe.iter().copied().collect();
        prop_assert_eq!(subscribed, after.difference(&prior).copied().collect::<BTreeSet<_>>());
        prop_assert_eq!(unsubscribed, prior.difference(&after).copied().collect::<BTreeSet<_>>());
    }
}

#[test]
fn session_routes_only_subscribed_tokens() {
    let desk = Desk::new();
    let label = |raw: &str| RowLabel::classify(&CellValue::from(raw));

    desk.session.reconcile_rows([
        (2, desk.session.binding_for(&label("NSE:INFY"))),
        (3, desk.session.binding_for(&label("nse:tcs"))),
        (4, desk.session.binding_for(&label("PORTFOLIO"))),
        (5, desk.session.binding_for(&label("NSE:NOSUCH"))),
    ]);

    assert_eq!(desk.feed.subscribed(), tokens(&[INFY_TOKEN, TCS_TOKEN]));
    assert_eq!(desk.ticks.routed_count(), 2);

    desk.session.reconcile_rows([
        (2, desk.session.binding_for(&label("NSE:SBIN"))),
        (3, None),
    ]);

    assert_eq!(desk.feed.unsubscribed(), tokens(&[INFY_TOKEN, TCS_TOKEN]));
    assert_eq!(
        desk.feed.subscribed(),
        tokens(&[INFY_TOKEN, TCS_TOKEN, SBIN_TOKEN])
    );
    assert_eq!(desk.ticks.routed_count(), 1);
}

#[test]
fn disconnected_feed_still_tracks_rows() {
    let desk = Desk::with_feed(FakeFeed::disconnected());
    let label = RowLabel::classify(&CellValue::from("NSE:INFY"));

    desk.session.assign_row(7, desk.session.binding_for(&label));

    assert!(desk.feed.subscribed().is_empty());
    assert_eq!(
        desk.session.tracker().active_tokens(),
        tokens(&[INFY_TOKEN])
    );
    assert_eq!(desk.session.tracker().rows_for(InstrumentToken::new(INFY_TOKEN)), vec![7]);
}

//! Account State
//!
//! Positions, holdings, the day's order book and margins as returned by the
//! brokerage. Fields the desk never reads are not modelled.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::symbol::SymbolKey;

/// A net or day position.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Position {
    /// Trading symbol.
    pub tradingsymbol: String,
    /// Exchange.
    pub exchange: String,
    /// Streaming token.
    pub instrument_token: u32,
    /// Product (`CNC`, `NRML`, `MIS`).
    pub product: String,
    /// Signed open quantity.
    pub quantity: i64,
    /// Average entry price.
    pub average_price: Decimal,
    /// Last price at the time of the snapshot.
    pub last_price: Decimal,
    /// Total P&L.
    pub pnl: Decimal,
    /// Realised P&L.
    pub realised: Decimal,
    /// Unrealised P&L.
    pub unrealised: Decimal,
    /// Mark-to-market P&L.
    pub m2m: Decimal,
}

impl Position {
    /// Symbol key for the position.
    #[must_use]
    pub fn symbol_key(&self) -> Option<SymbolKey> {
        SymbolKey::from_parts(&self.exchange, &self.tradingsymbol)
    }

    /// Whether the position is flat.
    #[must_use]
    pub const fn is_flat(&self) -> bool {
        self.quantity == 0
    }
}

/// Net and day positions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Positions {
    /// Net positions, carried forward plus today.
    pub net: Vec<Position>,
    /// Today's positions only.
    pub day: Vec<Position>,
}

/// A demat holding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Holding {
    /// Trading symbol.
    pub tradingsymbol: String,
    /// Exchange.
    pub exchange: String,
    /// Streaming token.
    pub instrument_token: u32,
    /// ISIN.
    pub isin: String,
    /// Settled quantity.
    pub quantity: i64,
    /// Quantity awaiting T+1 settlement.
    pub t1_quantity: i64,
    /// Average acquisition price.
    pub average_price: Decimal,
    /// Last price.
    pub last_price: Decimal,
    /// Previous close.
    pub close_price: Decimal,
    /// P&L.
    pub pnl: Decimal,
    /// Absolute change today.
    pub day_change: Decimal,
    /// Percent change today.
    pub day_change_percentage: Decimal,
}

impl Holding {
    /// Symbol key for the holding.
    #[must_use]
    pub fn symbol_key(&self) -> Option<SymbolKey> {
        SymbolKey::from_parts(&self.exchange, &self.tradingsymbol)
    }
}

/// One entry of the order book or of an order's history.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct OrderRecord {
    /// Order id.
    pub order_id: String,
    /// Parent order id for cover and bracket legs.
    pub parent_order_id: Option<String>,
    /// Variety (`regular`, `amo`, `co`, `iceberg`, `auction`).
    pub variety: String,
    /// Status (`OPEN`, `COMPLETE`, `TRIGGER PENDING`, ...).
    pub status: String,
    /// Exchange message for rejections.
    pub status_message: Option<String>,
    /// Trading symbol.
    pub tradingsymbol: String,
    /// Exchange.
    pub exchange: String,
    /// Order type (`MARKET`, `LIMIT`, `SL`, `SL-M`).
    pub order_type: String,
    /// Product.
    pub product: String,
    /// `BUY` or `SELL`.
    pub transaction_type: String,
    /// Ordered quantity.
    pub quantity: i64,
    /// Limit price.
    pub price: Decimal,
    /// Trigger price.
    pub trigger_price: Decimal,
    /// Average fill price.
    pub average_price: Decimal,
    /// Unfilled quantity.
    pub pending_quantity: i64,
    /// Filled quantity.
    pub filled_quantity: i64,
    /// Time the order was placed, as sent by the exchange.
    pub order_timestamp: Option<String>,
}

/// Cash available in a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AvailableMargin {
    /// Cash balance.
    pub cash: Decimal,
}

/// Margin consumed in a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct UtilisedMargin {
    /// Total debits.
    pub debits: Decimal,
}

/// Margins for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SegmentMargins {
    /// Net available margin.
    pub net: Decimal,
    /// Available funds.
    pub available: AvailableMargin,
    /// Utilised funds.
    pub utilised: UtilisedMargin,
}

/// Margins for all segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Margins {
    /// Equity segment.
    pub equity: Option<SegmentMargins>,
    /// Commodity segment.
    pub commodity: Option<SegmentMargins>,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn positions_deserialize_with_missing_fields() {
        let positions: Positions = serde_json::from_str(
            r#"{"net": [{"tradingsymbol": "INFY", "exchange": "NSE", "quantity": -25,
                         "average_price": 1500.5, "pnl": 120.25}]}"#,
        )
        .unwrap();
        assert!(positions.day.is_empty());
        let position = &positions.net[0];
        assert_eq!(position.quantity, -25);
        assert_eq!(position.pnl, dec!(120.25));
        assert_eq!(position.realised, Decimal::ZERO);
        assert_eq!(position.symbol_key().unwrap().as_str(), "NSE:INFY");
    }

    #[test]
    fn order_record_accepts_null_optionals() {
        let order: OrderRecord = serde_json::from_str(
            r#"{"order_id": "250101000012345", "parent_order_id": null,
                "status": "OPEN", "status_message": null, "quantity": 10,
                "order_timestamp": "2025-01-01 09:15:00"}"#,
        )
        .unwrap();
        assert_eq!(order.parent_order_id, None);
        assert_eq!(order.order_timestamp.as_deref(), Some("2025-01-01 09:15:00"));
    }

    #[test]
    fn margins_read_equity_segment() {
        let margins: Margins = serde_json::from_str(
            r#"{"equity": {"net": 99725.05, "available": {"cash": 245431.6},
                           "utilised": {"debits": 145706.55}}}"#,
        )
        .unwrap();
        let equity = margins.equity.unwrap();
        assert_eq!(equity.net, dec!(99725.05));
        assert_eq!(equity.utilised.debits, dec!(145706.55));
        assert!(margins.commodity.is_none());
    }
}

//! Order Instructions
//!
//! Interprets the order-entry columns of the INPUT sheet and the
//! modify/cancel columns of the Orders sheet, and formats the status strings
//! written back to them.

use std::fmt;

use rust_decimal::Decimal;

use super::sheet::layout::{input, orders};
use super::sheet::{CellValue, cell_at as cell};
use super::symbol::SymbolKey;

/// Order statuses that still accept a modify or cancel.
const AMENDABLE_STATUSES: [&str; 4] = ["OPEN", "TRIGGER PENDING", "AMO MODIFIED", "AMO REQ RECEIVED"];

/// Prefix written to INPUT `P` after a successful placement.
pub const PLACED_PREFIX: &str = "Placed: ";

// =============================================================================
// Enums
// =============================================================================

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

impl TransactionType {
    /// Parse `BUY` / `SELL`, case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }

    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    /// Market order.
    Market,
    /// Limit order.
    Limit,
    /// Stop-loss limit.
    StopLoss,
    /// Stop-loss market.
    StopLossMarket,
}

impl OrderType {
    /// Parse `MARKET`, `LIMIT`, `SL`, `SL-M`, case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "MARKET" => Some(Self::Market),
            "LIMIT" => Some(Self::Limit),
            "SL" => Some(Self::StopLoss),
            "SL-M" => Some(Self::StopLossMarket),
            _ => None,
        }
    }

    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::StopLoss => "SL",
            Self::StopLossMarket => "SL-M",
        }
    }

    /// Whether the limit price column is sent.
    #[must_use]
    pub const fn takes_price(self) -> bool {
        !matches!(self, Self::Market)
    }

    /// Whether the trigger price column is sent.
    #[must_use]
    pub const fn takes_trigger(self) -> bool {
        matches!(self, Self::StopLoss | Self::StopLossMarket)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Requests
// =============================================================================

/// A new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Variety, lowercase (`regular`, `amo`, `co`, `iceberg`).
    pub variety: String,
    /// Exchange.
    pub exchange: String,
    /// Trading symbol.
    pub tradingsymbol: String,
    /// Side.
    pub transaction_type: TransactionType,
    /// Quantity.
    pub quantity: u32,
    /// Order type.
    pub order_type: OrderType,
    /// Product, uppercase.
    pub product: String,
    /// Validity, uppercase (`DAY`, `IOC`, `TTL`).
    pub validity: String,
    /// Limit price.
    pub price: Option<Decimal>,
    /// Trigger price.
    pub trigger_price: Option<Decimal>,
    /// Minutes for `TTL` validity.
    pub validity_ttl: Option<u32>,
}

/// Changes to an open order. Unset fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyRequest {
    /// Variety of the order.
    pub variety: String,
    /// Order to modify.
    pub order_id: String,
    /// Parent id, sent for cover orders.
    pub parent_order_id: Option<String>,
    /// New limit price.
    pub price: Option<Decimal>,
    /// New trigger price.
    pub trigger_price: Option<Decimal>,
    /// New quantity.
    pub quantity: Option<i64>,
    /// New order type.
    pub order_type: Option<String>,
    /// New validity.
    pub validity: Option<String>,
    /// New disclosed quantity.
    pub disclosed_quantity: Option<i64>,
}

/// Cancellation of an open order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelRequest {
    /// Variety of the order.
    pub variety: String,
    /// Order to cancel.
    pub order_id: String,
    /// Parent id, sent for cover orders.
    pub parent_order_id: Option<String>,
}

// =============================================================================
// INPUT Sheet Entries
// =============================================================================

/// What to do with one INPUT row's order-entry columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDecision {
    /// Place this order.
    Place(OrderRequest),
    /// The row asked for an order but the columns do not form one.
    Invalid(String),
    /// A placed order whose status should be polled.
    Track {
        /// Order id recorded in the status cell, when present.
        order_id: Option<String>,
    },
    /// Nothing to do.
    Idle,
}

/// Cell is present and not a zero or blank value.
fn is_set(value: &CellValue) -> bool {
    match value {
        CellValue::Empty => false,
        CellValue::Bool(b) => *b,
        CellValue::Number(n) => *n != 0.0,
        CellValue::Text(text) => !text.trim().is_empty(),
    }
}

fn positive_decimal(value: &CellValue) -> Option<Decimal> {
    value.as_decimal().filter(|d| !d.is_zero())
}

impl EntryDecision {
    /// Interpret an INPUT row read from column `A`.
    #[must_use]
    pub fn from_row(row: &[CellValue]) -> Self {
        let status = cell(row, input::ENTRY_STATUS);
        let required = [
            input::SYMBOL,
            input::ORDER_QTY,
            input::DIRECTION,
            input::ENTRY_SIGNAL,
            input::VARIETY,
            input::ORDER_TYPE,
            input::PRODUCT,
            input::VALIDITY,
        ];
        let signalled = cell(row, input::ENTRY_SIGNAL)
            .display_text()
            .eq_ignore_ascii_case("yes");

        if signalled && status.is_blank() && required.iter().all(|c| is_set(cell(row, *c))) {
            return match Self::order_request(row) {
                Ok(request) => Self::Place(request),
                Err(message) => Self::Invalid(message),
            };
        }

        match status.as_text() {
            Some(text) if is_tracked_status(text) => Self::Track {
                order_id: placed_order_id(text),
            },
            _ => Self::Idle,
        }
    }

    fn order_request(row: &[CellValue]) -> Result<OrderRequest, String> {
        let symbol_text = cell(row, input::SYMBOL).display_text();
        let symbol = SymbolKey::parse(&symbol_text)
            .ok_or_else(|| format!("invalid symbol {symbol_text}"))?;

        let direction = cell(row, input::DIRECTION).display_text();
        let transaction_type = TransactionType::parse(&direction)
            .ok_or_else(|| format!("invalid direction {direction}"))?;

        let order_type_text = cell(row, input::ORDER_TYPE).display_text();
        let order_type = OrderType::parse(&order_type_text)
            .ok_or_else(|| format!("invalid order type {order_type_text}"))?;

        let quantity = cell(row, input::ORDER_QTY)
            .as_i64()
            .and_then(|q| u32::try_from(q).ok())
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                format!("invalid quantity {}", cell(row, input::ORDER_QTY).display_text())
            })?;

        let validity = cell(row, input::VALIDITY).display_text().to_uppercase();
        let validity_ttl = if validity == "TTL" {
            cell(row, input::TTL_MINUTES)
                .as_i64()
                .and_then(|m| u32::try_from(m).ok())
                .filter(|m| *m > 0)
        } else {
            None
        };

        Ok(OrderRequest {
            variety: cell(row, input::VARIETY).display_text().to_lowercase(),
            exchange: symbol.exchange().to_string(),
            tradingsymbol: symbol.tradingsymbol().to_string(),
            transaction_type,
            quantity,
            order_type,
            product: cell(row, input::PRODUCT).display_text().to_uppercase(),
            validity,
            price: order_type
                .takes_price()
                .then(|| positive_decimal(cell(row, input::PRICE)))
                .flatten(),
            trigger_price: order_type
                .takes_trigger()
                .then(|| positive_decimal(cell(row, input::TRIGGER)))
                .flatten(),
            validity_ttl,
        })
    }
}

/// Whether an INPUT status cell refers to an order still worth polling.
#[must_use]
pub fn is_tracked_status(status: &str) -> bool {
    status.starts_with(PLACED_PREFIX)
        || ["PENDING", "OPEN", "PARTIAL"]
            .iter()
            .any(|needle| status.contains(needle))
}

/// Order id out of a `Placed: <id>` status.
#[must_use]
pub fn placed_order_id(status: &str) -> Option<String> {
    status
        .strip_prefix(PLACED_PREFIX)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Status text for a placed order.
#[must_use]
pub fn placed_status(order_id: &str) -> String {
    format!("{PLACED_PREFIX}{order_id}")
}

/// Status text for the latest state of a tracked order.
#[must_use]
pub fn entry_status_for(status: &str, filled_quantity: i64) -> String {
    match status {
        "OPEN" | "TRIGGER PENDING" => format!("TRIGGER PENDING ({filled_quantity})"),
        "COMPLETE" => format!("ORDERED ({filled_quantity})"),
        "PARTIAL" => format!("PARTIAL ({filled_quantity})"),
        "REJECTED" | "CANCELLED" => format!("ERROR: {status}"),
        _ => format!("PENDING ({filled_quantity})"),
    }
}

/// Default product for a symbol's exchange: `NRML` for derivatives,
/// `CNC` for cash equity, none otherwise.
#[must_use]
pub fn default_product(exchange: &str) -> Option<&'static str> {
    match exchange {
        "NFO" | "BFO" => Some("NRML"),
        "NSE" | "BSE" => Some("CNC"),
        _ => None,
    }
}

// =============================================================================
// Orders Sheet Amendments
// =============================================================================

/// Modify or cancel instruction read from one Orders row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amendment {
    /// Cancel the order.
    Cancel(CancelRequest),
    /// Modify the order.
    Modify(ModifyRequest),
    /// Cancel requested on an order past the amendable states.
    NotCancellable,
    /// Modify requested on an order past the amendable states.
    NotModifiable,
    /// Modify requested with unusable new values.
    InvalidModify(String),
}

/// Whether an order in `status` can still be modified or cancelled.
#[must_use]
pub fn is_amendable(status: &str) -> bool {
    AMENDABLE_STATUSES.contains(&status)
}

fn optional_decimal(value: &CellValue, name: &str) -> Result<Option<Decimal>, String> {
    if value.is_blank() {
        return Ok(None);
    }
    value
        .as_decimal()
        .map(Some)
        .ok_or_else(|| format!("invalid {name} {}", value.display_text()))
}

fn optional_integer(value: &CellValue, name: &str) -> Result<Option<i64>, String> {
    if value.is_blank() {
        return Ok(None);
    }
    value
        .as_i64()
        .map(Some)
        .ok_or_else(|| format!("invalid {name} {}", value.display_text()))
}

fn optional_upper(value: &CellValue) -> Option<String> {
    (!value.is_blank()).then(|| value.display_text().to_uppercase())
}

impl Amendment {
    /// Interpret an Orders row read from column `A`.
    ///
    /// Returns `None` when the row has no order id or neither flag is set.
    /// A cancel flag takes precedence over a modify flag.
    #[must_use]
    pub fn from_row(row: &[CellValue]) -> Option<Self> {
        let order_id_cell = cell(row, orders::ORDER_ID);
        if !is_set(order_id_cell) {
            return None;
        }
        let order_id = order_id_cell.display_text();

        let variety_cell = cell(row, orders::VARIETY);
        let variety = if variety_cell.is_blank() {
            "regular".to_string()
        } else {
            variety_cell.display_text().to_lowercase()
        };
        let status = cell(row, orders::STATUS).display_text().to_uppercase();
        let parent_order_id = Some(cell(row, orders::PARENT_ORDER_ID))
            .filter(|c| is_set(c))
            .map(CellValue::display_text)
            .filter(|_| variety == "co");

        let modify_flag = cell(row, orders::MODIFY_FLAG).display_text().to_uppercase();
        let cancel_flag = cell(row, orders::CANCEL_FLAG).display_text().to_uppercase();

        if matches!(cancel_flag.as_str(), "YES" | "CANCEL" | "C") {
            if !is_amendable(&status) {
                return Some(Self::NotCancellable);
            }
            return Some(Self::Cancel(CancelRequest {
                variety,
                order_id,
                parent_order_id,
            }));
        }

        if matches!(modify_flag.as_str(), "YES" | "MODIFY") {
            if !is_amendable(&status) {
                return Some(Self::NotModifiable);
            }
            let request = Self::modify_request(row, variety, order_id, parent_order_id);
            return Some(request.map_or_else(Self::InvalidModify, Self::Modify));
        }

        None
    }

    fn modify_request(
        row: &[CellValue],
        variety: String,
        order_id: String,
        parent_order_id: Option<String>,
    ) -> Result<ModifyRequest, String> {
        Ok(ModifyRequest {
            variety,
            order_id,
            parent_order_id,
            price: optional_decimal(cell(row, orders::NEW_PRICE), "price")?,
            trigger_price: optional_decimal(cell(row, orders::NEW_TRIGGER), "trigger price")?,
            quantity: optional_integer(cell(row, orders::NEW_QUANTITY), "quantity")?,
            order_type: optional_upper(cell(row, orders::NEW_ORDER_TYPE)),
            validity: optional_upper(cell(row, orders::NEW_VALIDITY)),
            disclosed_quantity: optional_integer(
                cell(row, orders::NEW_DISCLOSED_QTY),
                "disclosed quantity",
            )?,
        })
    }
}

fn truncated(message: &str, limit: usize) -> String {
    message.chars().take(limit).collect()
}

/// Cancel result text for a failed cancellation.
#[must_use]
pub fn cancel_error_text(message: &str) -> String {
    format!("Cancel Error: {}", truncated(message, 20))
}

/// Modify result text for a failed modification.
#[must_use]
pub fn modify_error_text(message: &str) -> String {
    format!("Modify Error: {}", truncated(message, 30))
}

/// Modify result text for a successful modification.
#[must_use]
pub fn modified_text(order_id: &str) -> String {
    format!("Modified: {order_id}")
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use test_case::test_case;

    use super::*;
    use crate::domain::sheet::blank_row;
    use crate::domain::sheet::layout::offset;

    fn input_row(pairs: &[(u32, CellValue)]) -> Vec<CellValue> {
        let mut row = blank_row(input::WIDTH as usize);
        for (column, value) in pairs {
            row[offset(*column)] = value.clone();
        }
        row
    }

    fn entry(order_type: &str, status: &str) -> Vec<CellValue> {
        input_row(&[
            (input::SYMBOL, "nse:infy".into()),
            (input::ORDER_QTY, CellValue::Number(10.0)),
            (input::DIRECTION, "buy".into()),
            (input::ENTRY_SIGNAL, "YES".into()),
            (input::ENTRY_STATUS, status.into()),
            (input::VARIETY, "Regular".into()),
            (input::ORDER_TYPE, order_type.into()),
            (input::PRODUCT, "cnc".into()),
            (input::VALIDITY, "day".into()),
            (input::PRICE, CellValue::Number(1500.5)),
            (input::TRIGGER, CellValue::Number(1490.0)),
        ])
    }

    #[test]
    fn limit_entry_places_with_price_only() {
        let EntryDecision::Place(request) = EntryDecision::from_row(&entry("limit", "")) else {
            panic!("expected placement");
        };
        assert_eq!(request.variety, "regular");
        assert_eq!(request.exchange, "NSE");
        assert_eq!(request.tradingsymbol, "INFY");
        assert_eq!(request.transaction_type, TransactionType::Buy);
        assert_eq!(request.product, "CNC");
        assert_eq!(request.validity, "DAY");
        assert_eq!(request.price, Some(dec!(1500.5)));
        assert_eq!(request.trigger_price, None);
    }

    #[test]
    fn market_entry_sends_no_prices() {
        let EntryDecision::Place(request) = EntryDecision::from_row(&entry("MARKET", "")) else {
            panic!("expected placement");
        };
        assert_eq!(request.price, None);
        assert_eq!(request.trigger_price, None);
    }

    #[test]
    fn stop_loss_entry_sends_trigger() {
        let EntryDecision::Place(request) = EntryDecision::from_row(&entry("SL-M", "")) else {
            panic!("expected placement");
        };
        assert_eq!(request.order_type, OrderType::StopLossMarket);
        assert_eq!(request.trigger_price, Some(dec!(1490)));
    }

    #[test]
    fn ttl_validity_carries_minutes() {
        let mut row = entry("LIMIT", "");
        row[offset(input::VALIDITY)] = "ttl".into();
        row[offset(input::TTL_MINUTES)] = CellValue::Number(5.0);
        let EntryDecision::Place(request) = EntryDecision::from_row(&row) else {
            panic!("expected placement");
        };
        assert_eq!(request.validity_ttl, Some(5));
    }

    #[test]
    fn entry_with_status_is_not_replaced() {
        assert_eq!(
            EntryDecision::from_row(&entry("LIMIT", "ORDERED (10)")),
            EntryDecision::Idle
        );
    }

    #[test]
    fn entry_without_signal_is_idle() {
        let mut row = entry("LIMIT", "");
        row[offset(input::ENTRY_SIGNAL)] = "no".into();
        assert_eq!(EntryDecision::from_row(&row), EntryDecision::Idle);
    }

    #[test]
    fn bad_direction_is_invalid() {
        let mut row = entry("LIMIT", "");
        row[offset(input::DIRECTION)] = "HOLD".into();
        assert!(matches!(EntryDecision::from_row(&row), EntryDecision::Invalid(_)));
    }

    #[test]
    fn placed_status_is_tracked() {
        assert_eq!(
            EntryDecision::from_row(&entry("LIMIT", "Placed: 2501")),
            EntryDecision::Track {
                order_id: Some("2501".to_string())
            }
        );
        assert_eq!(
            EntryDecision::from_row(&entry("LIMIT", "TRIGGER PENDING (0)")),
            EntryDecision::Track { order_id: None }
        );
    }

    #[test_case("OPEN", 0, "TRIGGER PENDING (0)")]
    #[test_case("TRIGGER PENDING", 0, "TRIGGER PENDING (0)")]
    #[test_case("COMPLETE", 10, "ORDERED (10)")]
    #[test_case("PARTIAL", 4, "PARTIAL (4)")]
    #[test_case("REJECTED", 0, "ERROR: REJECTED")]
    #[test_case("CANCELLED", 0, "ERROR: CANCELLED")]
    #[test_case("VALIDATION PENDING", 0, "PENDING (0)")]
    fn entry_statuses(status: &str, filled: i64, expected: &str) {
        assert_eq!(entry_status_for(status, filled), expected);
    }

    #[test_case("NFO", Some("NRML"))]
    #[test_case("BFO", Some("NRML"))]
    #[test_case("NSE", Some("CNC"))]
    #[test_case("BSE", Some("CNC"))]
    #[test_case("MCX", None)]
    fn default_products(exchange: &str, expected: Option<&str>) {
        assert_eq!(default_product(exchange), expected);
    }

    fn orders_row(status: &str, modify: &str, cancel: &str) -> Vec<CellValue> {
        let mut row = blank_row(orders::INSTRUCTION_WIDTH as usize);
        row[offset(orders::ORDER_ID)] = CellValue::Number(250_101_000_012_345.0);
        row[offset(orders::STATUS)] = status.into();
        row[offset(orders::MODIFY_FLAG)] = modify.into();
        row[offset(orders::CANCEL_FLAG)] = cancel.into();
        row
    }

    #[test]
    fn cancel_defaults_variety_and_reads_numeric_id() {
        let amendment = Amendment::from_row(&orders_row("open", "", "c")).unwrap();
        assert_eq!(
            amendment,
            Amendment::Cancel(CancelRequest {
                variety: "regular".to_string(),
                order_id: "250101000012345".to_string(),
                parent_order_id: None,
            })
        );
    }

    #[test]
    fn cancel_wins_over_modify() {
        let amendment = Amendment::from_row(&orders_row("OPEN", "YES", "YES")).unwrap();
        assert!(matches!(amendment, Amendment::Cancel(_)));
    }

    #[test]
    fn completed_orders_cannot_be_amended() {
        assert_eq!(
            Amendment::from_row(&orders_row("COMPLETE", "", "CANCEL")),
            Some(Amendment::NotCancellable)
        );
        assert_eq!(
            Amendment::from_row(&orders_row("COMPLETE", "MODIFY", "")),
            Some(Amendment::NotModifiable)
        );
    }

    #[test]
    fn modify_omits_blank_fields() {
        let mut row = orders_row("TRIGGER PENDING", "yes", "");
        row[offset(orders::VARIETY)] = "CO".into();
        row[offset(orders::PARENT_ORDER_ID)] = "2500".into();
        row[offset(orders::NEW_PRICE)] = CellValue::Number(101.5);
        row[offset(orders::NEW_ORDER_TYPE)] = "limit".into();

        let Some(Amendment::Modify(request)) = Amendment::from_row(&row) else {
            panic!("expected modify");
        };
        assert_eq!(request.variety, "co");
        assert_eq!(request.parent_order_id.as_deref(), Some("2500"));
        assert_eq!(request.price, Some(dec!(101.5)));
        assert_eq!(request.order_type.as_deref(), Some("LIMIT"));
        assert_eq!(request.quantity, None);
        assert_eq!(request.trigger_price, None);
    }

    #[test]
    fn modify_with_garbage_quantity_is_invalid() {
        let mut row = orders_row("OPEN", "MODIFY", "");
        row[offset(orders::NEW_QUANTITY)] = "lots".into();
        assert!(matches!(
            Amendment::from_row(&row),
            Some(Amendment::InvalidModify(_))
        ));
    }

    #[test]
    fn rows_without_flags_or_id_are_skipped() {
        assert_eq!(Amendment::from_row(&orders_row("OPEN", "", "")), None);
        let mut row = orders_row("OPEN", "", "YES");
        row[offset(orders::ORDER_ID)] = CellValue::Empty;
        assert_eq!(Amendment::from_row(&row), None);
    }

    #[test]
    fn error_texts_are_truncated() {
        assert_eq!(
            cancel_error_text("Order cannot be cancelled as it is being processed"),
            "Cancel Error: Order cannot be canc"
        );
        assert_eq!(
            modify_error_text("Maximum allowed order modifications exceeded"),
            "Modify Error: Maximum allowed order modifica"
        );
    }
}

//! Fixed sheet layouts.
//!
//! Column numbers are 1-based (`A` = 1). Data rows start at row 2 on every
//! sheet; row 1 holds headers and the "Last Updated" stamps.

/// First data row on every sheet.
pub const FIRST_ROW: u32 = 2;

/// INPUT sheet: symbol rows with prices, order entry and order status.
pub mod input {
    /// Number of symbol rows (rows 2 through 201).
    pub const ROWS: u32 = 200;
    /// Last data row.
    pub const LAST_ROW: u32 = super::FIRST_ROW + ROWS - 1;

    /// `A`: symbol key or section marker.
    pub const SYMBOL: u32 = 1;
    /// `B`: position (or holding) quantity.
    pub const QUANTITY: u32 = 2;
    /// `C`: first of the nine price fields.
    pub const PRICES_FIRST: u32 = 3;
    /// `K`: last of the nine price fields.
    pub const PRICES_LAST: u32 = 11;
    /// `L`: order quantity.
    pub const ORDER_QTY: u32 = 12;
    /// `M`: transaction direction (`BUY` / `SELL`).
    pub const DIRECTION: u32 = 13;
    /// `N`: entry signal, `yes` to place.
    pub const ENTRY_SIGNAL: u32 = 14;
    /// `P`: entry status written back after placement.
    pub const ENTRY_STATUS: u32 = 16;
    /// `Q`: position or holding P&L.
    pub const PNL: u32 = 17;
    /// `R`: last refresh timestamp.
    pub const TIMESTAMP: u32 = 18;
    /// `S`: order variety.
    pub const VARIETY: u32 = 19;
    /// `T`: order type.
    pub const ORDER_TYPE: u32 = 20;
    /// `U`: product.
    pub const PRODUCT: u32 = 21;
    /// `V`: validity.
    pub const VALIDITY: u32 = 22;
    /// `W`: limit price.
    pub const PRICE: u32 = 23;
    /// `X`: trigger price.
    pub const TRIGGER: u32 = 24;
    /// `Y`: TTL validity in minutes.
    pub const TTL_MINUTES: u32 = 25;
    /// Width of a full INPUT row (`A:Y`).
    pub const WIDTH: u32 = TTL_MINUTES;
}

/// Portfolio sheet: open net positions.
pub mod portfolio {
    /// Rows reserved for positions.
    pub const ROWS: u32 = 50;
    /// Columns written per position (`A:I`).
    pub const WIDTH: u32 = 9;
    /// Stamp cell column (`K1`).
    pub const STAMP_COLUMN: u32 = 11;
}

/// Holdings sheet.
pub mod holdings {
    /// Rows reserved for holdings.
    pub const ROWS: u32 = 100;
    /// Columns written per holding (`A:K`).
    pub const WIDTH: u32 = 11;
    /// Stamp cell column (`L1`).
    pub const STAMP_COLUMN: u32 = 12;
}

/// Orders sheet: order book plus modify/cancel instruction columns.
pub mod orders {
    /// Rows reserved for orders.
    pub const ROWS: u32 = 100;
    /// Columns written per order (`A:P`).
    pub const WIDTH: u32 = 16;
    /// Rows cleared on the first sync after startup.
    pub const CLEAR_ROWS: u32 = 200;
    /// Stamp cell column (`AA1`).
    pub const STAMP_COLUMN: u32 = 27;

    /// `A`: order id.
    pub const ORDER_ID: u32 = 1;
    /// `B`: variety.
    pub const VARIETY: u32 = 2;
    /// `C`: status.
    pub const STATUS: u32 = 3;
    /// `P`: parent order id.
    pub const PARENT_ORDER_ID: u32 = 16;
    /// `Q`: modify flag and modify result.
    pub const MODIFY_FLAG: u32 = 17;
    /// `R`: cancel flag and cancel result.
    pub const CANCEL_FLAG: u32 = 18;
    /// `S`: new price.
    pub const NEW_PRICE: u32 = 19;
    /// `T`: new trigger price.
    pub const NEW_TRIGGER: u32 = 20;
    /// `U`: new quantity.
    pub const NEW_QUANTITY: u32 = 21;
    /// `V`: new order type.
    pub const NEW_ORDER_TYPE: u32 = 22;
    /// `W`: new validity.
    pub const NEW_VALIDITY: u32 = 23;
    /// `X`: new disclosed quantity.
    pub const NEW_DISCLOSED_QTY: u32 = 24;
    /// Width of an instruction row (`A:X`).
    pub const INSTRUCTION_WIDTH: u32 = NEW_DISCLOSED_QTY;
}

/// Funds sheet: margin summary.
pub mod funds {
    /// First label row (`A4`).
    pub const FIRST_ROW: u32 = 4;
    /// Value column (`B`).
    pub const VALUE_COLUMN: u32 = 2;
    /// Stamp cell column (`C1`).
    pub const STAMP_COLUMN: u32 = 3;
}

/// Header row used for the "Last Updated" stamps.
pub const STAMP_ROW: u32 = 1;

/// Sheet row of the `index`-th data row of a block read from `FIRST_ROW`.
#[must_use]
pub fn data_row(index: usize) -> u32 {
    FIRST_ROW.saturating_add(u32::try_from(index).unwrap_or(u32::MAX))
}

/// Column index as a zero-based offset into a row read from column `A`.
#[must_use]
pub const fn offset(column: u32) -> usize {
    (column - 1) as usize
}

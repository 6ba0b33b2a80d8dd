//! Brokerage Port (Driven Port)
//!
//! Interface for account state, market quotes, instrument dumps and order
//! management at the brokerage.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::account::{Holding, Margins, OrderRecord, Positions};
use crate::domain::instrument::Instrument;
use crate::domain::market_data::Quote;
use crate::domain::orders::{CancelRequest, ModifyRequest, OrderRequest};
use crate::domain::symbol::SymbolKey;

/// Brokerage port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerageError {
    /// Network or transport failure.
    #[error("Brokerage connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Request timed out.
    #[error("Brokerage request timed out")]
    Timeout,

    /// Request rejected by the brokerage (bad input, order rule).
    #[error("{message}")]
    Rejected {
        /// Message from the brokerage.
        message: String,
    },

    /// Session token expired or invalid.
    #[error("Session error: {message}")]
    Session {
        /// Message from the brokerage.
        message: String,
    },

    /// Rate limited.
    #[error("Rate limited by brokerage")]
    RateLimited,

    /// Unknown error.
    #[error("Brokerage error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

impl BrokerageError {
    /// Whether this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Whether retrying later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout | Self::RateLimited)
    }
}

/// Port for brokerage interactions.
#[async_trait]
pub trait BrokeragePort: Send + Sync {
    /// Net and day positions.
    async fn positions(&self) -> Result<Positions, BrokerageError>;

    /// Demat holdings.
    async fn holdings(&self) -> Result<Vec<Holding>, BrokerageError>;

    /// Today's order book.
    async fn orders(&self) -> Result<Vec<OrderRecord>, BrokerageError>;

    /// State transitions of one order, oldest first.
    async fn order_history(&self, order_id: &str) -> Result<Vec<OrderRecord>, BrokerageError>;

    /// Account margins.
    async fn margins(&self) -> Result<Margins, BrokerageError>;

    /// Full quotes keyed by symbol. Unknown symbols are absent from the map.
    async fn quotes(&self, symbols: &[SymbolKey])
    -> Result<HashMap<SymbolKey, Quote>, BrokerageError>;

    /// Instrument dump for one exchange.
    async fn instruments(&self, exchange: &str) -> Result<Vec<Instrument>, BrokerageError>;

    /// Place an order, returning its id.
    async fn place_order(&self, request: &OrderRequest) -> Result<String, BrokerageError>;

    /// Modify an open order, returning its id.
    async fn modify_order(&self, request: &ModifyRequest) -> Result<String, BrokerageError>;

    /// Cancel an open order, returning its id.
    async fn cancel_order(&self, request: &CancelRequest) -> Result<String, BrokerageError>;
}

//! Tick Feed Port (Driven Port)
//!
//! Subscription control on the streaming connection. Ticks themselves flow
//! into the tick cache, not through this port.

use crate::domain::symbol::InstrumentToken;

/// Tick feed error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// The streaming connection is not open.
    #[error("ticker not connected")]
    NotConnected,

    /// The streaming task has stopped.
    #[error("ticker command channel closed")]
    ChannelClosed,
}

/// Port for subscription control.
///
/// Calls never block. The desired set is always updated, even when the
/// call reports that the connection is down; it is replayed on reconnect.
pub trait TickFeedPort: Send + Sync {
    /// Whether the streaming connection is currently open.
    fn is_connected(&self) -> bool;

    /// Subscribe tokens in full mode.
    ///
    /// # Errors
    ///
    /// Returns `FeedError` when the command could not be sent now.
    fn subscribe(&self, tokens: &[InstrumentToken]) -> Result<(), FeedError>;

    /// Unsubscribe tokens.
    ///
    /// # Errors
    ///
    /// Returns `FeedError` when the command could not be sent now.
    fn unsubscribe(&self, tokens: &[InstrumentToken]) -> Result<(), FeedError>;
}

//! Kite Ticker Wire Codec
//!
//! Binary frames carry a big-endian `i16` packet count followed by
//! `i16` length-prefixed packets. Packet length selects the layout:
//!
//! | Length | Layout                                   |
//! |--------|------------------------------------------|
//! | 8      | LTP                                      |
//! | 28     | index quote                              |
//! | 32     | index full (adds exchange timestamp)     |
//! | 44     | quote                                    |
//! | 184    | full (adds OI, timestamps, 5x2 depth)    |
//!
//! Prices are integer paise (÷100), or ÷10^7 for the currency segment.
//! A 1-byte frame is a heartbeat. Text frames carry JSON notices; commands
//! go out as JSON text.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::market_data::{Depth, DepthLevel, Ohlc, Tick, TickMode};
use crate::domain::symbol::InstrumentToken;

const SEGMENT_CDS: u8 = 3;
const SEGMENT_INDICES: u8 = 9;

const LTP_LEN: usize = 8;
const INDEX_QUOTE_LEN: usize = 28;
const INDEX_FULL_LEN: usize = 32;
const QUOTE_LEN: usize = 44;
const FULL_LEN: usize = 184;

const DEPTH_OFFSET: usize = 64;
const DEPTH_ENTRY_LEN: usize = 12;
const DEPTH_LEVELS: usize = 5;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame ended before a declared length was satisfied.
    #[error("truncated frame: needed {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        /// Offset of the read.
        offset: usize,
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },

    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decoded binary frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Keep-alive.
    Heartbeat,
    /// Market data packets, in wire order.
    Ticks(Vec<Tick>),
}

// =============================================================================
// Binary Decoding
// =============================================================================

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], CodecError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(CodecError::Truncated {
                offset,
                needed: len,
                available: self.bytes.len().saturating_sub(offset),
            })
    }

    fn u16_at(&self, offset: usize) -> Result<u16, CodecError> {
        let raw = self.slice(offset, 2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }
}

fn u32_at(packet: &[u8], offset: usize) -> u32 {
    packet
        .get(offset..offset + 4)
        .map_or(0, |raw| u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn u16_at(packet: &[u8], offset: usize) -> u16 {
    packet
        .get(offset..offset + 2)
        .map_or(0, |raw| u16::from_be_bytes([raw[0], raw[1]]))
}

fn timestamp_at(packet: &[u8], offset: usize) -> Option<DateTime<Utc>> {
    match u32_at(packet, offset) {
        0 => None,
        secs => DateTime::from_timestamp(i64::from(secs), 0),
    }
}

/// Decode one binary frame.
///
/// Packets with an unrecognised length are skipped.
///
/// # Errors
///
/// Returns `CodecError::Truncated` when a declared count or length runs past
/// the end of the frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    if bytes.len() <= 1 {
        return Ok(Frame::Heartbeat);
    }

    let reader = Reader { bytes };
    let count = reader.u16_at(0)?;
    let mut offset = 2;
    let mut ticks = Vec::with_capacity(usize::from(count));

    for _ in 0..count {
        let len = usize::from(reader.u16_at(offset)?);
        let packet = reader.slice(offset + 2, len)?;
        offset += 2 + len;
        match decode_packet(packet) {
            Some(tick) => ticks.push(tick),
            None => tracing::trace!(len, "Skipping packet of unknown length"),
        }
    }

    Ok(Frame::Ticks(ticks))
}

/// Decode a single packet by its length.
#[must_use]
pub fn decode_packet(packet: &[u8]) -> Option<Tick> {
    if !matches!(
        packet.len(),
        LTP_LEN | INDEX_QUOTE_LEN | INDEX_FULL_LEN | QUOTE_LEN | FULL_LEN
    ) {
        return None;
    }

    let token = InstrumentToken::new(u32_at(packet, 0));
    let segment = token.segment();
    let scale = if segment == SEGMENT_CDS { 7 } else { 2 };
    let price = |offset| Decimal::new(i64::from(u32_at(packet, offset)), scale);

    let mut tick = Tick::ltp(token, price(4));
    tick.tradable = segment != SEGMENT_INDICES;

    match packet.len() {
        INDEX_QUOTE_LEN | INDEX_FULL_LEN => {
            let ohlc = Ohlc {
                high: price(8),
                low: price(12),
                open: price(16),
                close: price(20),
            };
            tick.mode = if packet.len() == INDEX_FULL_LEN {
                TickMode::Full
            } else {
                TickMode::Quote
            };
            tick.change = percent_change(tick.last_price, ohlc.close);
            tick.ohlc = Some(ohlc);
            if packet.len() == INDEX_FULL_LEN {
                tick.exchange_timestamp = timestamp_at(packet, 28);
            }
        }
        QUOTE_LEN | FULL_LEN => {
            let ohlc = Ohlc {
                open: price(28),
                high: price(32),
                low: price(36),
                close: price(40),
            };
            tick.mode = TickMode::Quote;
            tick.last_quantity = Some(u64::from(u32_at(packet, 8)));
            tick.average_price = Some(price(12));
            tick.volume = Some(u64::from(u32_at(packet, 16)));
            tick.buy_quantity = Some(u64::from(u32_at(packet, 20)));
            tick.sell_quantity = Some(u64::from(u32_at(packet, 24)));
            tick.change = percent_change(tick.last_price, ohlc.close);
            tick.ohlc = Some(ohlc);

            if packet.len() == FULL_LEN {
                tick.mode = TickMode::Full;
                tick.last_trade_time = timestamp_at(packet, 44);
                tick.oi = Some(u64::from(u32_at(packet, 48)));
                tick.oi_day_high = Some(u64::from(u32_at(packet, 52)));
                tick.oi_day_low = Some(u64::from(u32_at(packet, 56)));
                tick.exchange_timestamp = timestamp_at(packet, 60);
                tick.depth = Some(decode_depth(packet, scale));
            }
        }
        _ => {}
    }

    Some(tick)
}

fn decode_depth(packet: &[u8], scale: u32) -> Depth {
    let level = |index: usize| {
        let at = DEPTH_OFFSET + index * DEPTH_ENTRY_LEN;
        DepthLevel {
            quantity: u64::from(u32_at(packet, at)),
            price: Decimal::new(i64::from(u32_at(packet, at + 4)), scale),
            orders: u32::from(u16_at(packet, at + 8)),
        }
    };
    Depth {
        buy: (0..DEPTH_LEVELS).map(level).collect(),
        sell: (DEPTH_LEVELS..2 * DEPTH_LEVELS).map(level).collect(),
    }
}

fn percent_change(last: Decimal, close: Decimal) -> Option<Decimal> {
    if close.is_zero() {
        return Some(Decimal::ZERO);
    }
    ((last - close) * Decimal::ONE_HUNDRED).checked_div(close)
}

// =============================================================================
// Text Commands and Notices
// =============================================================================

/// Wire name of a streaming mode.
#[must_use]
pub const fn mode_name(mode: TickMode) -> &'static str {
    match mode {
        TickMode::Ltp => "ltp",
        TickMode::Quote => "quote",
        TickMode::Full => "full",
    }
}

/// An outgoing ticker command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start streaming tokens.
    Subscribe(Vec<InstrumentToken>),
    /// Stop streaming tokens.
    Unsubscribe(Vec<InstrumentToken>),
    /// Switch tokens to a streaming mode.
    Mode(TickMode, Vec<InstrumentToken>),
}

impl Command {
    /// Encode as the JSON text frame the ticker expects.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, CodecError> {
        let raw = |tokens: &[InstrumentToken]| -> Vec<u32> {
            tokens.iter().map(|t| t.get()).collect()
        };
        let value = match self {
            Self::Subscribe(tokens) => serde_json::json!({"a": "subscribe", "v": raw(tokens)}),
            Self::Unsubscribe(tokens) => {
                serde_json::json!({"a": "unsubscribe", "v": raw(tokens)})
            }
            Self::Mode(mode, tokens) => {
                serde_json::json!({"a": "mode", "v": [mode_name(*mode), raw(tokens)]})
            }
        };
        Ok(serde_json::to_string(&value)?)
    }
}

#[derive(Debug, Deserialize)]
struct RawNotice {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A JSON notice received as a text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Order update postback.
    Order(serde_json::Value),
    /// Error message from the ticker.
    Error(String),
    /// Informational message.
    Message(String),
    /// Anything else.
    Other(String),
}

/// Decode a text frame.
///
/// # Errors
///
/// Returns `CodecError::Json` when the text is not a notice object.
pub fn decode_notice(text: &str) -> Result<Notice, CodecError> {
    let raw: RawNotice = serde_json::from_str(text)?;
    let text_of = |data: serde_json::Value| match data {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    Ok(match raw.kind.as_str() {
        "order" => Notice::Order(raw.data),
        "error" => Notice::Error(text_of(raw.data)),
        "message" => Notice::Message(text_of(raw.data)),
        other => Notice::Other(other.to_string()),
    })
}

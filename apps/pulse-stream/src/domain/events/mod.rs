//! Pipeline Events
//!
//! The closed set of events exchanged over the in-process bus. Every event is
//! an immutable value; the bus shares it between subscribers by `Arc`.
//!
//! ```text
//! RawTick ──► TickReceived ──► TickProcessed ──► TickStreamed
//!  (wire)      (ingestion)      (processor)       (gateway)
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Schema version stamped on every processed tick.
pub const PROCESSED_SCHEMA_VERSION: &str = "1.0.0";

// =============================================================================
// Raw Tick
// =============================================================================

/// Wire-level trade record as decoded from the exchange feed.
///
/// Produced by the connector and consumed immediately by ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTick {
    /// Exchange symbol (e.g. `BTCUSDT`).
    pub symbol: String,
    /// Trade price.
    pub price: Decimal,
    /// Trade time in epoch milliseconds.
    pub timestamp: i64,
    /// Exchange trade identifier, if the venue provides one.
    pub trade_id: Option<String>,
}

// =============================================================================
// Event Payloads
// =============================================================================

/// A tick that was successfully parsed off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReceived {
    /// Exchange symbol.
    pub symbol: String,
    /// Trade price as received.
    pub price: Decimal,
    /// Trade time in epoch milliseconds.
    pub timestamp: i64,
    /// Source exchange tag.
    pub exchange: String,
    /// Exchange trade identifier.
    pub trade_id: Option<String>,
}

impl TickReceived {
    /// Build the ingestion event for a raw tick from `exchange`.
    #[must_use]
    pub fn from_raw(raw: RawTick, exchange: &str) -> Self {
        Self {
            symbol: raw.symbol,
            price: raw.price,
            timestamp: raw.timestamp,
            exchange: exchange.to_string(),
            trade_id: raw.trade_id,
        }
    }
}

/// A validated tick with normalized price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickProcessed {
    /// Exchange symbol.
    pub symbol: String,
    /// Price rounded to the processed precision.
    pub price: Decimal,
    /// Original trade time in epoch milliseconds.
    pub timestamp: i64,
    /// Source exchange tag.
    pub exchange: String,
    /// Processing time in epoch milliseconds.
    pub processed_at: i64,
    /// Schema version of this event.
    pub version: String,
}

/// Emitted by the gateway after a processed tick was pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickStreamed {
    /// Exchange symbol.
    pub symbol: String,
    /// Price that was pushed.
    pub price: Decimal,
    /// Original trade time in epoch milliseconds.
    pub timestamp: i64,
    /// Push time in epoch milliseconds.
    pub streamed_at: i64,
    /// Number of clients the payload was pushed to.
    pub recipients: usize,
}

// =============================================================================
// Event Union
// =============================================================================

/// Discriminant used to route events on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`PriceEvent::Received`].
    TickReceived,
    /// [`PriceEvent::Processed`].
    TickProcessed,
    /// [`PriceEvent::Streamed`].
    TickStreamed,
}

impl EventKind {
    /// All event kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::TickReceived, Self::TickProcessed, Self::TickStreamed]
    }

    /// Stable name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TickReceived => "tick_received",
            Self::TickProcessed => "tick_processed",
            Self::TickStreamed => "tick_streamed",
        }
    }
}

/// Every event that travels over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceEvent {
    /// Ingested tick.
    Received(TickReceived),
    /// Validated and normalized tick.
    Processed(TickProcessed),
    /// Tick delivered to WebSocket clients.
    Streamed(TickStreamed),
}

impl PriceEvent {
    /// The routing discriminant of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Received(_) => EventKind::TickReceived,
            Self::Processed(_) => EventKind::TickProcessed,
            Self::Streamed(_) => EventKind::TickStreamed,
        }
    }

    /// Symbol carried by the event.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Received(e) => &e.symbol,
            Self::Processed(e) => &e.symbol,
            Self::Streamed(e) => &e.symbol,
        }
    }
}

impl From<TickReceived> for PriceEvent {
    fn from(event: TickReceived) -> Self {
        Self::Received(event)
    }
}

impl From<TickProcessed> for PriceEvent {
    fn from(event: TickProcessed) -> Self {
        Self::Processed(event)
    }
}

impl From<TickStreamed> for PriceEvent {
    fn from(event: TickStreamed) -> Self {
        Self::Streamed(event)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn kind_matches_variant() {
        let received = PriceEvent::from(TickReceived {
            symbol: "BTCUSDT".to_string(),
            price: Decimal::from(50_000),
            timestamp: 1,
            exchange: "binance".to_string(),
            trade_id: None,
        });
        assert_eq!(received.kind(), EventKind::TickReceived);
        assert_eq!(received.symbol(), "BTCUSDT");

        let processed = PriceEvent::from(TickProcessed {
            symbol: "ETHUSDT".to_string(),
            price: Decimal::from(3_000),
            timestamp: 1,
            exchange: "binance".to_string(),
            processed_at: 2,
            version: PROCESSED_SCHEMA_VERSION.to_string(),
        });
        assert_eq!(processed.kind(), EventKind::TickProcessed);
        assert_eq!(processed.symbol(), "ETHUSDT");
    }

    #[test]
    fn from_raw_preserves_fields() {
        let raw = RawTick {
            symbol: "BTCUSDT".to_string(),
            price: Decimal::from_str("50000.456").unwrap(),
            timestamp: 1_700_000_000_000,
            trade_id: Some("trade-123".to_string()),
        };

        let event = TickReceived::from_raw(raw, "binance");

        assert_eq!(event.symbol, "BTCUSDT");
        assert_eq!(event.price, Decimal::from_str("50000.456").unwrap());
        assert_eq!(event.timestamp, 1_700_000_000_000);
        assert_eq!(event.exchange, "binance");
        assert_eq!(event.trade_id.as_deref(), Some("trade-123"));
    }

    #[test]
    fn all_kinds_have_distinct_names() {
        let names: std::collections::HashSet<_> =
            EventKind::all().iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), EventKind::all().len());
    }
}

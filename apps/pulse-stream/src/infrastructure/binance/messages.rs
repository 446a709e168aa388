//! Binance Combined-Stream Messages
//!
//! Wire types for `wss://stream.binance.com:9443/stream?streams=...`.
//!
//! Every frame is wrapped in an envelope naming the stream it came from:
//!
//! ```json
//! {"stream":"btcusdt@trade","data":{"e":"trade","E":1700000000001,"s":"BTCUSDT",
//!  "t":12345,"p":"50000.456","q":"0.010","T":1700000000000,"m":true}}
//! ```
//!
//! Prices are decimal strings and are deserialized straight into
//! [`Decimal`].

use rust_decimal::Decimal;
use serde::Deserialize;

/// Event type tag of trade payloads.
pub const TRADE_EVENT: &str = "trade";

/// Combined-stream envelope.
///
/// Control responses (e.g. `{"result":null,"id":1}`) carry neither field.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEnvelope {
    /// Stream name, e.g. `btcusdt@trade`.
    #[serde(default)]
    pub stream: Option<String>,
    /// Stream payload.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl StreamEnvelope {
    /// The `data.e` event tag, if present.
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.data.as_ref()?.get("e")?.as_str()
    }
}

/// Payload of a `<symbol>@trade` stream.
///
/// Only the fields that feed a tick are decoded; the rest of the payload
/// (`E`, `q`, `m`, ...) is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TradePayload {
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,
    /// Trade ID.
    #[serde(rename = "t")]
    pub trade_id: u64,
    /// Price.
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,
    /// Trade time in epoch milliseconds.
    #[serde(rename = "T")]
    pub trade_time: i64,
}

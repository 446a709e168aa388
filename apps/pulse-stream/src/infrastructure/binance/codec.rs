//! Stream Codec
//!
//! Decodes combined-stream text frames into [`RawTick`]s. Only `trade`
//! payloads produce ticks; every other well-formed frame is ignored.

use crate::domain::events::RawTick;

use super::messages::{StreamEnvelope, TRADE_EVENT, TradePayload};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode one text frame.
///
/// Returns `Ok(None)` for frames that are not trades.
///
/// # Errors
///
/// Returns [`CodecError`] if the frame is not valid JSON or a trade payload
/// is malformed.
///
/// # Example
///
/// ```rust
/// use pulse_stream::infrastructure::binance::decode;
///
/// let frame = r#"{"stream":"btcusdt@trade","data":{"e":"trade","E":2,"s":"BTCUSDT",
///     "t":7,"p":"50000.456","q":"1","T":1}}"#;
/// let tick = decode(frame).unwrap().unwrap();
/// assert_eq!(tick.symbol, "BTCUSDT");
/// assert_eq!(tick.timestamp, 1);
/// assert_eq!(tick.trade_id.as_deref(), Some("7"));
/// ```
pub fn decode(text: &str) -> Result<Option<RawTick>, CodecError> {
    let envelope: StreamEnvelope = serde_json::from_str(text)?;
    if envelope.event_type() != Some(TRADE_EVENT) {
        return Ok(None);
    }

    let Some(data) = envelope.data else {
        return Ok(None);
    };
    let trade: TradePayload = serde_json::from_value(data)?;

    Ok(Some(RawTick {
        symbol: trade.symbol,
        price: trade.price,
        timestamp: trade.trade_time,
        trade_id: Some(trade.trade_id.to_string()),
    }))
}

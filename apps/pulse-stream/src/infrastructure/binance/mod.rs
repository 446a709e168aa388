//! Binance Exchange Adapter
//!
//! Implements the [`MarketConnector`](crate::application::ports::MarketConnector)
//! port against Binance's public combined trade streams.
//!
//! - `client`: connection lifecycle with reconnect/backoff
//! - `codec`: text frame to [`RawTick`](crate::domain::events::RawTick) decoding
//! - `messages`: wire types
//! - `reconnect`: exponential backoff policy

mod client;
mod codec;
pub mod messages;
mod reconnect;

pub use client::{
    BinanceConnector, BinanceConnectorConfig, ConnectorError, DEFAULT_STREAM_URL, stream_url,
};
pub use codec::{CodecError, decode};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};

//! Price Streaming Gateway
//!
//! Fans processed ticks out to connected WebSocket clients. Every client may
//! restrict the symbols it receives with a `symbols` query parameter given
//! at connect time.
//!
//! # Delivery
//!
//! A tick is serialized once per broadcast and the shared payload is queued
//! on each matching client without waiting. A client whose buffer is full
//! loses that payload; other clients are unaffected. Closed clients are
//! skipped until their connection task deregisters them.

mod server;
mod sink;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::task::JoinHandle;

pub use server::{GatewayState, StreamQuery, router};
pub use sink::ChannelSink;

use crate::application::ports::{ClientSink, PushError};
use crate::domain::events::{EventKind, PriceEvent, TickProcessed, TickStreamed};
use crate::domain::subscription::{ClientRegistry, ConnectionId, SymbolFilter};
use crate::infrastructure::bus::SharedEventBus;
use crate::infrastructure::metrics;

// =============================================================================
// Wire Payload
// =============================================================================

/// Message pushed to clients for each processed tick.
#[derive(Debug, Serialize)]
struct PricePayload<'a> {
    symbol: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    timestamp: i64,
    exchange: &'a str,
}

/// Serialize the client payload for `tick`.
///
/// # Errors
///
/// Returns [`GatewayError::Serialization`] if encoding fails.
pub fn encode_payload(tick: &TickProcessed) -> Result<Arc<str>, GatewayError> {
    let payload = PricePayload {
        symbol: &tick.symbol,
        price: tick.price,
        timestamp: tick.timestamp,
        exchange: &tick.exchange,
    };
    Ok(Arc::from(serde_json::to_string(&payload)?))
}

// =============================================================================
// Errors
// =============================================================================

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Payload serialization failed.
    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

// =============================================================================
// Gateway
// =============================================================================

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients the payload was queued for.
    pub sent: usize,
    /// Matching clients whose buffer was full.
    pub dropped: usize,
    /// Matching clients that were already closed.
    pub skipped: usize,
}

/// Per-client filtered fan-out of processed ticks.
pub struct PriceStreamGateway {
    bus: SharedEventBus,
    clients: ClientRegistry<Arc<dyn ClientSink>>,
    subscribed: AtomicBool,
}

/// Shared gateway reference.
pub type SharedGateway = Arc<PriceStreamGateway>;

impl PriceStreamGateway {
    /// Create a gateway publishing stream reports to `bus`.
    #[must_use]
    pub fn new(bus: SharedEventBus) -> Self {
        Self {
            bus,
            clients: ClientRegistry::new(),
            subscribed: AtomicBool::new(false),
        }
    }

    /// Subscribe to processed ticks. Subsequent calls return `None`.
    pub fn after_init(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            tracing::warn!("Gateway already subscribed to processed ticks");
            return None;
        }

        let gateway = Arc::clone(self);
        Some(self.bus.subscribe_fn(EventKind::TickProcessed, move |event| {
            if let PriceEvent::Processed(tick) = event {
                gateway.broadcast(tick);
            }
        }))
    }

    /// Track a new client. `symbols` is the raw `symbols` query value.
    pub fn handle_connection(
        &self,
        handle: Arc<dyn ClientSink>,
        symbols: Option<&str>,
    ) -> ConnectionId {
        let filter = SymbolFilter::parse(symbols);
        let description = filter.describe();
        let id = self.clients.register(handle, filter);
        let clients = self.clients.len();
        metrics::set_ws_clients(clients);
        tracing::info!(client_id = id, symbols = %description, clients, "Client connected");
        id
    }

    /// Stop tracking a client.
    pub fn handle_disconnect(&self, id: ConnectionId) {
        if self.clients.remove(id).is_some() {
            let clients = self.clients.len();
            metrics::set_ws_clients(clients);
            tracing::info!(client_id = id, clients, "Client disconnected");
        }
    }

    /// Push `tick` to every open client whose filter admits its symbol.
    pub fn broadcast(&self, tick: &TickProcessed) -> BroadcastReport {
        let payload = match encode_payload(tick) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(symbol = %tick.symbol, error = %e, "Dropping tick");
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport::default();
        self.clients.for_each_matching(&tick.symbol, |id, client| {
            if !client.is_open() {
                report.skipped += 1;
                return;
            }
            match client.push(Arc::clone(&payload)) {
                Ok(()) => report.sent += 1,
                Err(PushError::Full) => {
                    report.dropped += 1;
                    tracing::debug!(client_id = id, symbol = %tick.symbol, "Client buffer full");
                }
                Err(PushError::Closed) => report.skipped += 1,
            }
        });

        metrics::record_pushes_sent(report.sent);
        if report.dropped > 0 {
            metrics::record_pushes_dropped(report.dropped);
        }

        if report.sent > 0 {
            self.bus.publish(TickStreamed {
                symbol: tick.symbol.clone(),
                price: tick.price,
                timestamp: tick.timestamp,
                streamed_at: Utc::now().timestamp_millis(),
                recipients: report.sent,
            });
        }

        report
    }

    /// Number of tracked clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use parking_lot::Mutex;

    use super::*;
    use crate::domain::events::PROCESSED_SCHEMA_VERSION;
    use crate::infrastructure::bus::EventBus;

    struct RecordingSink {
        open: AtomicBool,
        capacity: usize,
        received: Mutex<Vec<Arc<str>>>,
    }

    impl RecordingSink {
        fn new(capacity: usize) -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(true),
                capacity,
                received: Mutex::new(Vec::new()),
            })
        }

        fn messages(&self) -> Vec<serde_json::Value> {
            self.received
                .lock()
                .iter()
                .map(|p| serde_json::from_str(p).unwrap())
                .collect()
        }
    }

    impl ClientSink for RecordingSink {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn push(&self, payload: Arc<str>) -> Result<(), PushError> {
            let mut received = self.received.lock();
            if received.len() >= self.capacity {
                return Err(PushError::Full);
            }
            received.push(payload);
            Ok(())
        }
    }

    fn tick(symbol: &str, price: &str) -> TickProcessed {
        TickProcessed {
            symbol: symbol.to_string(),
            price: Decimal::from_str(price).unwrap(),
            timestamp: 1_700_000_000_000,
            exchange: "binance".to_string(),
            processed_at: 1_700_000_000_010,
            version: PROCESSED_SCHEMA_VERSION.to_string(),
        }
    }

    #[test]
    fn payload_has_numeric_price() {
        let payload = encode_payload(&tick("BTCUSDT", "50000.46")).unwrap();
        assert_eq!(
            &*payload,
            r#"{"symbol":"BTCUSDT","price":50000.46,"timestamp":1700000000000,"exchange":"binance"}"#
        );
    }

    #[test]
    fn filtered_client_receives_only_its_symbols() {
        let gateway = PriceStreamGateway::new(EventBus::shared());
        let btc = RecordingSink::new(16);
        let all = RecordingSink::new(16);
        gateway.handle_connection(btc.clone(), Some("btcusdt"));
        gateway.handle_connection(all.clone(), None);

        gateway.broadcast(&tick("BTCUSDT", "50000.46"));
        gateway.broadcast(&tick("ETHUSDT", "3000.10"));

        let btc_symbols: Vec<_> = btc.messages().iter().map(|m| m["symbol"].clone()).collect();
        assert_eq!(btc_symbols, vec!["BTCUSDT"]);
        assert_eq!(all.messages().len(), 2);
        assert_eq!(all.messages()[1]["price"], serde_json::json!(3000.1));
    }

    #[test]
    fn closed_clients_are_skipped_not_removed() {
        let gateway = PriceStreamGateway::new(EventBus::shared());
        let closed = RecordingSink::new(16);
        closed.open.store(false, Ordering::SeqCst);
        gateway.handle_connection(closed.clone(), None);

        let report = gateway.broadcast(&tick("BTCUSDT", "1"));

        assert_eq!(report, BroadcastReport { sent: 0, dropped: 0, skipped: 1 });
        assert!(closed.received.lock().is_empty());
        assert_eq!(gateway.client_count(), 1);
    }

    #[test]
    fn full_buffer_drops_only_that_client() {
        let gateway = PriceStreamGateway::new(EventBus::shared());
        let slow = RecordingSink::new(1);
        let fast = RecordingSink::new(16);
        gateway.handle_connection(slow.clone(), None);
        gateway.handle_connection(fast.clone(), None);

        gateway.broadcast(&tick("BTCUSDT", "1"));
        let report = gateway.broadcast(&tick("BTCUSDT", "2"));

        assert_eq!(report, BroadcastReport { sent: 1, dropped: 1, skipped: 0 });
        assert_eq!(slow.messages().len(), 1);
        assert_eq!(fast.messages().len(), 2);
    }

    #[test]
    fn disconnect_stops_delivery() {
        let gateway = PriceStreamGateway::new(EventBus::shared());
        let sink = RecordingSink::new(16);
        let id = gateway.handle_connection(sink.clone(), None);

        gateway.handle_disconnect(id);
        gateway.handle_disconnect(id);
        gateway.broadcast(&tick("BTCUSDT", "1"));

        assert_eq!(gateway.client_count(), 0);
        assert!(sink.received.lock().is_empty());
    }

    #[test]
    fn streamed_event_reports_recipients() {
        let bus = EventBus::shared();
        let mut streamed = bus.subscribe(EventKind::TickStreamed);
        let gateway = PriceStreamGateway::new(Arc::clone(&bus));

        gateway.broadcast(&tick("BTCUSDT", "1"));
        assert!(streamed.try_recv().is_none(), "no clients, no report");

        gateway.handle_connection(RecordingSink::new(16), None);
        gateway.handle_connection(RecordingSink::new(16), Some("BTCUSDT,ETHUSDT"));
        gateway.broadcast(&tick("BTCUSDT", "1"));

        let event = streamed.try_recv().unwrap();
        let PriceEvent::Streamed(report) = event.as_ref() else {
            panic!("unexpected event {event:?}");
        };
        assert_eq!(report.symbol, "BTCUSDT");
        assert_eq!(report.recipients, 2);
    }

    #[tokio::test]
    async fn after_init_subscribes_once() {
        let bus = EventBus::shared();
        let gateway = Arc::new(PriceStreamGateway::new(Arc::clone(&bus)));

        assert!(gateway.after_init().is_some());
        assert!(gateway.after_init().is_none());
        assert_eq!(bus.subscriber_count(EventKind::TickProcessed), 1);
    }
}

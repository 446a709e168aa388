//! Market Ingestion
//!
//! Bridges the connector's tick channel onto the bus. Raw ticks are stamped
//! with the source exchange tag and published as `TickReceived`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::MarketConnector;
use crate::domain::events::{RawTick, TickReceived};
use crate::infrastructure::bus::SharedEventBus;
use crate::infrastructure::metrics;

/// Drives one exchange connector and republishes its ticks.
pub struct MarketIngestionService {
    connector: Arc<dyn MarketConnector>,
    bus: SharedEventBus,
    exchange: String,
    symbols: Vec<String>,
}

impl MarketIngestionService {
    /// Create an ingestion service for `symbols` on `exchange`.
    #[must_use]
    pub fn new(
        connector: Arc<dyn MarketConnector>,
        bus: SharedEventBus,
        exchange: impl Into<String>,
        symbols: Vec<String>,
    ) -> Self {
        Self {
            connector,
            bus,
            exchange: exchange.into(),
            symbols,
        }
    }

    /// Start the connector with the configured symbol set.
    pub fn start(&self) {
        tracing::info!(
            exchange = %self.exchange,
            symbols = %self.symbols.join(","),
            "Starting market ingestion"
        );
        self.connector.connect(&self.symbols);
    }

    /// Disconnect the connector.
    pub fn stop(&self) {
        tracing::info!(exchange = %self.exchange, "Stopping market ingestion");
        self.connector.disconnect();
    }

    /// Publish one raw tick. Returns the number of bus subscribers reached.
    pub fn ingest(&self, raw: RawTick) -> usize {
        metrics::record_tick_received();
        self.bus.publish(TickReceived::from_raw(raw, &self.exchange))
    }

    /// Drain `ticks` until the channel closes or `cancel` fires.
    pub async fn run(&self, mut ticks: mpsc::Receiver<RawTick>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                tick = ticks.recv() => match tick {
                    Some(raw) => {
                        self.ingest(raw);
                    }
                    None => break,
                },
            }
        }
        tracing::debug!(exchange = %self.exchange, "Ingestion loop ended");
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;
    use crate::application::ports::MockMarketConnector;
    use crate::domain::events::{EventKind, PriceEvent};
    use crate::infrastructure::bus::EventBus;

    fn raw(symbol: &str, price: &str) -> RawTick {
        RawTick {
            symbol: symbol.to_string(),
            price: Decimal::from_str(price).unwrap(),
            timestamp: 1_700_000_000_000,
            trade_id: Some("12345".to_string()),
        }
    }

    #[test]
    fn start_and_stop_drive_connector() {
        let mut connector = MockMarketConnector::new();
        connector
            .expect_connect()
            .withf(|symbols| symbols == ["BTCUSDT".to_string(), "ETHUSDT".to_string()])
            .times(1)
            .return_const(());
        connector.expect_disconnect().times(1).return_const(());

        let service = MarketIngestionService::new(
            Arc::new(connector),
            EventBus::shared(),
            "binance",
            vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        );

        service.start();
        service.stop();
    }

    #[test]
    fn ingest_stamps_exchange() {
        let bus = EventBus::shared();
        let mut stream = bus.subscribe(EventKind::TickReceived);
        let service = MarketIngestionService::new(
            Arc::new(MockMarketConnector::new()),
            Arc::clone(&bus),
            "binance",
            vec![],
        );

        assert_eq!(service.ingest(raw("BTCUSDT", "50000.456")), 1);

        let event = stream.try_recv().unwrap();
        let PriceEvent::Received(tick) = event.as_ref() else {
            panic!("unexpected event {event:?}");
        };
        assert_eq!(tick.exchange, "binance");
        assert_eq!(tick.price, Decimal::from_str("50000.456").unwrap());
        assert_eq!(tick.trade_id.as_deref(), Some("12345"));
    }

    #[tokio::test]
    async fn run_drains_channel_until_closed() {
        let bus = EventBus::shared();
        let mut stream = bus.subscribe(EventKind::TickReceived);
        let service = MarketIngestionService::new(
            Arc::new(MockMarketConnector::new()),
            Arc::clone(&bus),
            "binance",
            vec![],
        );

        let (tx, rx) = mpsc::channel(8);
        tx.send(raw("BTCUSDT", "1")).await.unwrap();
        tx.send(raw("ETHUSDT", "2")).await.unwrap();
        drop(tx);

        service.run(rx, CancellationToken::new()).await;

        assert_eq!(stream.try_recv().unwrap().symbol(), "BTCUSDT");
        assert_eq!(stream.try_recv().unwrap().symbol(), "ETHUSDT");
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let service = MarketIngestionService::new(
            Arc::new(MockMarketConnector::new()),
            EventBus::shared(),
            "binance",
            vec![],
        );
        let (_tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        service.run(rx, cancel).await;
    }
}

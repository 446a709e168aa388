//! Pipeline Integration Tests
//!
//! Drives raw ticks through ingestion, processing, the terminal sink and the
//! gateway over a shared bus.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::time::timeout;

use common::StubConnector;
use pulse_stream::infrastructure::gateway::ChannelSink;
use pulse_stream::{
    ConnectionState, Direction, EventBus, EventKind, MarketIngestionService, PriceEvent,
    PriceProcessor, PriceStreamGateway, RawTick, RenderedTick, SharedEventBus, TerminalSink,
    TickRenderer,
};

const DEBOUNCE: Duration = Duration::from_millis(20);

#[derive(Default)]
struct RecordingRenderer {
    rendered: Mutex<Vec<RenderedTick>>,
}

impl TickRenderer for RecordingRenderer {
    fn render(&self, tick: &RenderedTick) {
        self.rendered.lock().push(tick.clone());
    }
}

struct Pipeline {
    bus: SharedEventBus,
    ingestion: MarketIngestionService,
    renderer: Arc<RecordingRenderer>,
    gateway: Arc<PriceStreamGateway>,
}

fn setup() -> Pipeline {
    let bus = EventBus::shared();

    Arc::new(PriceProcessor::new(Arc::clone(&bus))).start();

    let renderer = Arc::new(RecordingRenderer::default());
    let terminal = Arc::new(TerminalSink::new(
        Arc::clone(&renderer) as Arc<dyn TickRenderer>,
        DEBOUNCE,
    ));
    terminal.start(&bus);

    let gateway = Arc::new(PriceStreamGateway::new(Arc::clone(&bus)));
    gateway.after_init();

    let ingestion = MarketIngestionService::new(
        Arc::new(StubConnector(ConnectionState::Idle)),
        Arc::clone(&bus),
        "binance",
        vec!["BTCUSDT".to_string()],
    );

    Pipeline {
        bus,
        ingestion,
        renderer,
        gateway,
    }
}

fn raw(symbol: &str, price: &str, timestamp: i64) -> RawTick {
    RawTick {
        symbol: symbol.to_string(),
        price: Decimal::from_str(price).unwrap(),
        timestamp,
        trade_id: Some("12345".to_string()),
    }
}

async fn next_payload(rx: &mut mpsc::Receiver<Arc<str>>) -> serde_json::Value {
    let payload = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for payload")
        .expect("client queue closed");
    serde_json::from_str(&payload).unwrap()
}

#[tokio::test]
async fn tick_reaches_terminal_and_client_normalized() {
    let pipeline = setup();
    let (tx, mut rx) = mpsc::channel(16);
    pipeline
        .gateway
        .handle_connection(Arc::new(ChannelSink::new(tx)), None);

    pipeline
        .ingestion
        .ingest(raw("BTCUSDT", "50000.456", 1_700_000_000_000));

    let message = next_payload(&mut rx).await;
    assert_eq!(message["symbol"], "BTCUSDT");
    assert_eq!(message["price"], serde_json::json!(50000.46));
    assert_eq!(message["timestamp"], 1_700_000_000_000_i64);
    assert_eq!(message["exchange"], "binance");

    tokio::time::sleep(DEBOUNCE * 5).await;
    let rendered = pipeline.renderer.rendered.lock().clone();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].price, Decimal::from_str("50000.46").unwrap());
    assert_eq!(rendered[0].direction, Direction::Unchanged);
}

#[tokio::test]
async fn invalid_ticks_are_dropped() {
    let pipeline = setup();
    let mut processed = pipeline.bus.subscribe(EventKind::TickProcessed);

    pipeline.ingestion.ingest(raw("BTCUSDT", "0", 1_700_000_000_000));
    pipeline.ingestion.ingest(raw("  ", "10", 1_700_000_000_000));
    pipeline.ingestion.ingest(raw("ETHUSDT", "10", 0));
    pipeline.ingestion.ingest(raw("ETHUSDT", "3000.104", 1_700_000_000_001));

    let event = timeout(Duration::from_secs(1), processed.recv())
        .await
        .unwrap()
        .unwrap();
    let PriceEvent::Processed(tick) = event.as_ref() else {
        panic!("unexpected event {event:?}");
    };
    assert_eq!(tick.symbol, "ETHUSDT");
    assert_eq!(tick.price, Decimal::from_str("3000.10").unwrap());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(processed.try_recv().is_none());
}

#[tokio::test]
async fn duplicate_tick_is_processed_twice() {
    let pipeline = setup();
    let (tx, mut rx) = mpsc::channel(16);
    pipeline
        .gateway
        .handle_connection(Arc::new(ChannelSink::new(tx)), Some("BTCUSDT"));

    let tick = raw("BTCUSDT", "42000.5", 1_700_000_000_000);
    pipeline.ingestion.ingest(tick.clone());
    pipeline.ingestion.ingest(tick);

    let first = next_payload(&mut rx).await;
    let second = next_payload(&mut rx).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn terminal_debounces_bursts_per_symbol() {
    let pipeline = setup();

    for price in ["100.00", "101.00", "102.00"] {
        pipeline
            .ingestion
            .ingest(raw("BTCUSDT", price, 1_700_000_000_000));
    }
    pipeline
        .ingestion
        .ingest(raw("ETHUSDT", "10.00", 1_700_000_000_000));

    tokio::time::sleep(DEBOUNCE * 10).await;

    let mut rendered = pipeline.renderer.rendered.lock().clone();
    rendered.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    assert_eq!(rendered.len(), 2);
    assert_eq!(rendered[0].symbol, "BTCUSDT");
    assert_eq!(rendered[0].price, Decimal::from_str("102.00").unwrap());
    assert_eq!(rendered[1].symbol, "ETHUSDT");
}

//! Price Streaming Integration Tests
//!
//! Runs the HTTP server with the merged stream router on a loopback port and
//! connects real WebSocket clients.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rust_decimal::Decimal;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use common::StubConnector;
use pulse_stream::infrastructure::gateway;
use pulse_stream::{
    ConnectionState, EventBus, HealthServer, HealthServerState, PriceStreamGateway, TickProcessed,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    gateway: Arc<PriceStreamGateway>,
    cancel: CancellationToken,
}

async fn start_server(connection: ConnectionState) -> TestServer {
    let bus = EventBus::shared();
    let gateway = Arc::new(PriceStreamGateway::new(Arc::clone(&bus)));
    let cancel = CancellationToken::new();

    let state = Arc::new(HealthServerState::new(
        "test-0.0.1".to_string(),
        Arc::new(StubConnector(connection)),
        Arc::clone(&gateway),
        bus,
    ));
    let server = HealthServer::new(0, state, cancel.clone()).merge(gateway::router(
        Arc::clone(&gateway),
        "/prices",
        16,
        cancel.clone(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server.serve(listener).await.unwrap();
    });

    TestServer {
        addr,
        gateway,
        cancel,
    }
}

async fn connect(addr: SocketAddr, query: &str) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/prices{query}"))
        .await
        .unwrap();
    client
}

async fn wait_for_clients(gateway: &PriceStreamGateway, expected: usize) {
    timeout(Duration::from_secs(2), async {
        while gateway.client_count() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client count never reached expected value");
}

async fn next_message(client: &mut Client) -> serde_json::Value {
    loop {
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

fn tick(symbol: &str, price: &str) -> TickProcessed {
    TickProcessed {
        symbol: symbol.to_string(),
        price: Decimal::from_str(price).unwrap(),
        timestamp: 1_700_000_000_000,
        exchange: "binance".to_string(),
        processed_at: 1_700_000_000_005,
        version: "1.0.0".to_string(),
    }
}

#[tokio::test]
async fn clients_receive_filtered_streams() {
    let server = start_server(ConnectionState::Connected).await;
    let mut btc_only = connect(server.addr, "?symbols=btcusdt").await;
    let mut everything = connect(server.addr, "").await;
    wait_for_clients(&server.gateway, 2).await;

    server.gateway.broadcast(&tick("ETHUSDT", "3000.10"));
    server.gateway.broadcast(&tick("BTCUSDT", "50000.46"));

    let first = next_message(&mut btc_only).await;
    assert_eq!(first["symbol"], "BTCUSDT");
    assert_eq!(first["price"], serde_json::json!(50000.46));

    assert_eq!(next_message(&mut everything).await["symbol"], "ETHUSDT");
    assert_eq!(next_message(&mut everything).await["symbol"], "BTCUSDT");

    server.cancel.cancel();
}

#[tokio::test]
async fn closing_client_is_deregistered() {
    let server = start_server(ConnectionState::Connected).await;
    let mut client = connect(server.addr, "?symbols=ETHUSDT,DOGEUSDT").await;
    wait_for_clients(&server.gateway, 1).await;

    client.close(None).await.unwrap();
    wait_for_clients(&server.gateway, 0).await;

    server.cancel.cancel();
}

#[tokio::test]
async fn health_endpoints_follow_connector_state() {
    let server = start_server(ConnectionState::Reconnecting).await;

    let liveness = http_get(server.addr, "/healthz").await;
    assert!(liveness.starts_with("HTTP/1.1 200"));

    let readiness = http_get(server.addr, "/readyz").await;
    assert!(readiness.starts_with("HTTP/1.1 503"));

    let health = http_get(server.addr, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.contains(r#""status":"degraded""#));
    assert!(health.contains(r#""state":"reconnecting""#));

    server.cancel.cancel();
}

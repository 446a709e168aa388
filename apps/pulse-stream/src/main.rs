//! Pulse Stream Binary
//!
//! Starts the live trade tick relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin pulse-stream
//! ```
//!
//! # Environment Variables
//!
//! - `PORT`: HTTP/WebSocket port (default: 3001)
//! - `PULSE_WS_PATH`: WebSocket endpoint path (default: /prices)
//! - `PULSE_SYMBOLS`: Comma-separated symbols (default: BTCUSDT,ETHUSDT,DOGEUSDT)
//! - `PULSE_EXCHANGE`: Exchange tag on ticks (default: binance)
//! - `BINANCE_STREAM_URL`: Combined-stream endpoint
//! - `PULSE_RECONNECT_*`, `PULSE_MAX_RECONNECT_ATTEMPTS`: Backoff tuning
//! - `PULSE_CLIENT_BUFFER`: Per-client outbound queue size (default: 256)
//! - `PULSE_TERMINAL_ENABLED`: Print prices to stdout (default: true)
//! - `PULSE_TERMINAL_DEBOUNCE_MS`: Terminal debounce window (default: 100)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pulse_stream::application::ports::MarketConnector;
use pulse_stream::infrastructure::binance::{BinanceConnector, BinanceConnectorConfig};
use pulse_stream::infrastructure::console::ConsoleRenderer;
use pulse_stream::infrastructure::gateway::{self, PriceStreamGateway};
use pulse_stream::infrastructure::health::{HealthServer, HealthServerState};
use pulse_stream::infrastructure::telemetry;
use pulse_stream::{
    AppConfig, EventBus, MarketIngestionService, PriceProcessor, TerminalSink, init_metrics,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize telemetry (tracing + optional OTLP)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Pulse Stream");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = AppConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let bus = EventBus::shared();
    let mut tasks = Vec::new();

    // Price processor
    let processor = Arc::new(PriceProcessor::new(Arc::clone(&bus)));
    tasks.push(processor.start());

    // Terminal display
    if config.terminal.enabled {
        let terminal = Arc::new(TerminalSink::new(
            Arc::new(ConsoleRenderer::new()),
            config.terminal.debounce,
        ));
        tasks.push(terminal.start(&bus));
    }

    // Streaming gateway
    let gateway = Arc::new(PriceStreamGateway::new(Arc::clone(&bus)));
    tasks.extend(gateway.after_init());

    // Exchange connector and ingestion
    let (tick_tx, tick_rx) = mpsc::channel(config.connector.tick_channel_capacity);
    let connector: Arc<dyn MarketConnector> = Arc::new(BinanceConnector::new(
        BinanceConnectorConfig::from_settings(&config.connector),
        tick_tx,
        shutdown_token.clone(),
    ));
    let ingestion = Arc::new(MarketIngestionService::new(
        Arc::clone(&connector),
        Arc::clone(&bus),
        config.market.exchange.clone(),
        config.market.symbols.clone(),
    ));
    ingestion.start();

    let ingestion_task = {
        let ingestion = Arc::clone(&ingestion);
        let cancel = shutdown_token.clone();
        tokio::spawn(async move { ingestion.run(tick_rx, cancel).await })
    };

    // HTTP server: health, metrics and the price stream
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&connector),
        Arc::clone(&gateway),
        Arc::clone(&bus),
    ));
    let stream_routes = gateway::router(
        Arc::clone(&gateway),
        &config.server.ws_path,
        config.gateway.client_buffer,
        shutdown_token.clone(),
    );
    let http_server =
        HealthServer::new(config.server.port, health_state, shutdown_token.clone())
            .merge(stream_routes);

    let listener = http_server.bind().await?;

    tracing::info!(
        port = config.server.port,
        ws = %format!("ws://localhost:{}{}", config.server.port, config.server.ws_path),
        "Price stream listening"
    );

    let server_task = tokio::spawn(async move {
        if let Err(e) = http_server.serve(listener).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tracing::info!("Pulse Stream ready");

    await_shutdown(shutdown_token).await;

    ingestion.stop();
    for task in &tasks {
        task.abort();
    }

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = ingestion_task.await;
        let _ = server_task.await;
    })
    .await
    .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out"
        );
    }

    tracing::info!("Pulse Stream stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    tracing::info!(
        exchange = %config.market.exchange,
        symbols = %config.market.symbols.join(","),
        port = config.server.port,
        ws_path = %config.server.ws_path,
        terminal = config.terminal.enabled,
        "Configuration loaded"
    );
    tracing::debug!(
        stream_url = %config.connector.stream_url,
        max_reconnect_attempts = config.connector.max_reconnect_attempts,
        client_buffer = config.gateway.client_buffer,
        "Connector settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}

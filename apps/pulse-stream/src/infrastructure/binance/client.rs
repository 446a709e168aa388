//! Binance WebSocket Connector
//!
//! Streams public trades for a symbol set from Binance's combined-stream
//! endpoint and delivers them as [`RawTick`]s over an `mpsc` channel.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──connect──► Connecting ──open──► Connected
//!                       ▲                    │ close / error
//!                       │                    ▼
//!                  Reconnecting ◄──delay── Disconnected ──attempts exhausted──► (stays)
//! ```
//!
//! `disconnect` returns to `Idle` from any state. Each `connect` starts a new
//! session guarded by its own cancellation token; a session only changes the
//! shared state while its token is live, and cancellation happens under the
//! same lock, so a stale session can never overwrite a newer one.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::codec;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{ConnectionState, MarketConnector};
use crate::domain::events::RawTick;
use crate::infrastructure::config::ConnectorSettings;
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a connector session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Server closed the connection.
    #[error("connection closed")]
    ConnectionClosed,
}

// =============================================================================
// Configuration
// =============================================================================

/// Default combined-stream endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://stream.binance.com:9443/stream";

/// Configuration for the Binance connector.
#[derive(Debug, Clone)]
pub struct BinanceConnectorConfig {
    /// Combined-stream base URL (without query).
    pub url: String,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
}

impl Default for BinanceConnectorConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl BinanceConnectorConfig {
    /// Build from application connector settings.
    #[must_use]
    pub fn from_settings(settings: &ConnectorSettings) -> Self {
        Self {
            url: settings.stream_url.clone(),
            reconnect: ReconnectConfig::from_settings(settings),
        }
    }
}

/// Build the combined-stream URL for `symbols`.
///
/// ```rust
/// use pulse_stream::infrastructure::binance::stream_url;
///
/// let url = stream_url(
///     "wss://stream.binance.com:9443/stream",
///     &["BTCUSDT".to_string(), "ethusdt".to_string()],
/// );
/// assert_eq!(
///     url,
///     "wss://stream.binance.com:9443/stream?streams=btcusdt@trade/ethusdt@trade"
/// );
/// ```
#[must_use]
pub fn stream_url(base: &str, symbols: &[String]) -> String {
    let streams = symbols
        .iter()
        .map(|symbol| format!("{}@trade", symbol.to_lowercase()))
        .collect::<Vec<_>>()
        .join("/");
    format!("{base}?streams={streams}")
}

// =============================================================================
// Connector
// =============================================================================

#[derive(Debug, Default)]
struct Session {
    state: ConnectionState,
    token: Option<CancellationToken>,
    attempts: u32,
}

struct Inner {
    config: BinanceConnectorConfig,
    tick_tx: mpsc::Sender<RawTick>,
    shutdown: CancellationToken,
    session: Mutex<Session>,
}

/// Resilient connector to Binance public trade streams.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct BinanceConnector {
    inner: Arc<Inner>,
}

impl BinanceConnector {
    /// Create a connector delivering ticks to `tick_tx`.
    ///
    /// Session tokens are children of `shutdown`, so cancelling it stops any
    /// live session.
    #[must_use]
    pub fn new(
        config: BinanceConnectorConfig,
        tick_tx: mpsc::Sender<RawTick>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                tick_tx,
                shutdown,
                session: Mutex::new(Session::default()),
            }),
        }
    }

    /// Reconnect attempts made since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.session.lock().attempts
    }
}

impl MarketConnector for BinanceConnector {
    fn connect(&self, symbols: &[String]) {
        let token = {
            let mut session = self.inner.session.lock();
            if matches!(
                session.state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                tracing::debug!(state = %session.state, "Connect ignored, session active");
                return;
            }

            if let Some(previous) = session.token.take() {
                previous.cancel();
            }
            let token = self.inner.shutdown.child_token();
            session.token = Some(token.clone());
            session.state = ConnectionState::Connecting;
            session.attempts = 0;
            token
        };

        tokio::spawn(run_session(
            Arc::clone(&self.inner),
            symbols.to_vec(),
            token,
        ));
    }

    fn disconnect(&self) {
        tracing::info!("Disconnecting from Binance");
        let mut session = self.inner.session.lock();
        if let Some(token) = session.token.take() {
            token.cancel();
        }
        session.state = ConnectionState::Idle;
        session.attempts = 0;
        metrics::set_connector_up(false);
    }

    fn state(&self) -> ConnectionState {
        self.inner.session.lock().state
    }
}

// =============================================================================
// Session Loop
// =============================================================================

impl Inner {
    /// Apply a state change if `token` still owns the session.
    fn transition(
        &self,
        token: &CancellationToken,
        state: ConnectionState,
        attempts: u32,
    ) -> bool {
        let mut session = self.session.lock();
        if token.is_cancelled() {
            return false;
        }
        session.state = state;
        session.attempts = attempts;
        true
    }

    async fn forward(&self, text: &str) {
        match codec::decode(text) {
            Ok(Some(tick)) => {
                if self.tick_tx.send(tick).await.is_err() {
                    tracing::debug!("Tick receiver dropped");
                }
            }
            Ok(None) => {
                tracing::trace!("Ignoring non-trade frame");
            }
            Err(e) => {
                metrics::record_parse_error();
                tracing::warn!(error = %e, "Failed to parse stream message");
            }
        }
    }
}

async fn run_session(inner: Arc<Inner>, symbols: Vec<String>, token: CancellationToken) {
    let url = stream_url(&inner.config.url, &symbols);
    let mut policy = ReconnectPolicy::new(inner.config.reconnect.clone());

    loop {
        if !inner.transition(&token, ConnectionState::Connecting, policy.attempt_count()) {
            return;
        }

        match connect_and_run(&inner, &url, &token, &mut policy).await {
            Ok(()) => return,
            Err(e) => tracing::warn!(error = %e, "Binance connection error"),
        }

        metrics::set_connector_up(false);
        if !inner.transition(&token, ConnectionState::Disconnected, policy.attempt_count()) {
            return;
        }

        let Some(delay) = policy.next_delay() else {
            tracing::error!(
                max_attempts = policy.max_attempts(),
                "Max reconnection attempts reached, stopping reconnection"
            );
            return;
        };

        let attempt = policy.attempt_count();
        if !inner.transition(&token, ConnectionState::Reconnecting, attempt) {
            return;
        }
        metrics::record_reconnect();
        tracing::info!(
            attempt,
            max_attempts = policy.max_attempts(),
            delay_ms = delay.as_millis(),
            "Reconnecting to Binance"
        );

        tokio::select! {
            () = token.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Connect and pump messages until the connection ends.
///
/// Returns `Ok(())` only when the session was cancelled.
async fn connect_and_run(
    inner: &Inner,
    url: &str,
    token: &CancellationToken,
    policy: &mut ReconnectPolicy,
) -> Result<(), ConnectorError> {
    tracing::info!(%url, "Connecting to Binance");

    let connected = tokio::select! {
        () = token.cancelled() => return Ok(()),
        result = tokio_tungstenite::connect_async(url) => result,
    };
    let (ws_stream, _response) = connected?;

    policy.reset();
    if !inner.transition(token, ConnectionState::Connected, 0) {
        return Ok(());
    }
    metrics::set_connector_up(true);
    tracing::info!("Connected to Binance");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            () = token.cancelled() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "Failed to send close frame");
                }
                return Ok(());
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        inner.forward(text.as_str()).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Server sent close frame");
                        return Err(ConnectorError::ConnectionClosed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Err(ConnectorError::ConnectionClosed);
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

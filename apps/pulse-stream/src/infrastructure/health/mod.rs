//! Health Check and Metrics Endpoint
//!
//! HTTP endpoints for health checks, connector status reporting and
//! Prometheus metrics. The server also mounts the price stream router so
//! everything is served from one port.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (upstream feed connected)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ConnectionState, MarketConnector};
use crate::domain::events::EventKind;
use crate::infrastructure::bus::SharedEventBus;
use crate::infrastructure::gateway::SharedGateway;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Relay version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Upstream feed status.
    pub feed: FeedInfo,
    /// Connected WebSocket clients.
    pub clients: usize,
    /// Bus subscriber counts per event kind.
    pub subscribers: SubscriberStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Upstream feed connected.
    Healthy,
    /// Upstream feed connecting or recovering.
    Degraded,
    /// Upstream feed idle or down.
    Unhealthy,
}

/// Upstream feed status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Connection state.
    pub state: &'static str,
    /// Whether the feed is connected.
    pub connected: bool,
}

/// Bus subscriber counts.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberStatus {
    /// Subscribers to received ticks.
    pub tick_received: usize,
    /// Subscribers to processed ticks.
    pub tick_processed: usize,
    /// Subscribers to stream reports.
    pub tick_streamed: usize,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    connector: Arc<dyn MarketConnector>,
    gateway: SharedGateway,
    bus: SharedEventBus,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(
        version: String,
        connector: Arc<dyn MarketConnector>,
        gateway: SharedGateway,
        bus: SharedEventBus,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            connector,
            gateway,
            bus,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// HTTP server for health, metrics and any merged routes.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    extra: Router,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            extra: Router::new(),
            cancel,
        }
    }

    /// Serve `routes` alongside the health endpoints.
    #[must_use]
    pub fn merge(mut self, routes: Router) -> Self {
        self.extra = self.extra.merge(routes);
        self
    }

    /// Build the complete router.
    pub fn into_router(self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state)
            .merge(self.extra)
    }

    /// Bind the configured port on all interfaces.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError::BindFailed` if the port is unavailable.
    pub async fn bind(&self) -> Result<TcpListener, HealthServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))
    }

    /// Serve on an already bound listener until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError::ServerFailed` on a fatal server error.
    pub async fn serve(self, listener: TcpListener) -> Result<(), HealthServerError> {
        let cancel = self.cancel.clone();
        let app = self.into_router();

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "HTTP server listening");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.connector.state().is_connected() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let connection = state.connector.state();

    HealthResponse {
        status: determine_health_status(connection),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed: FeedInfo {
            state: connection.as_str(),
            connected: connection.is_connected(),
        },
        clients: state.gateway.client_count(),
        subscribers: SubscriberStatus {
            tick_received: state.bus.subscriber_count(EventKind::TickReceived),
            tick_processed: state.bus.subscriber_count(EventKind::TickProcessed),
            tick_streamed: state.bus.subscriber_count(EventKind::TickStreamed),
        },
    }
}

const fn determine_health_status(state: ConnectionState) -> HealthStatus {
    match state {
        ConnectionState::Connected => HealthStatus::Healthy,
        ConnectionState::Connecting | ConnectionState::Reconnecting => HealthStatus::Degraded,
        ConnectionState::Idle | ConnectionState::Disconnected => HealthStatus::Unhealthy,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::application::ports::MockMarketConnector;
    use crate::infrastructure::bus::EventBus;
    use crate::infrastructure::gateway::PriceStreamGateway;

    fn state_with(connection: ConnectionState) -> HealthServerState {
        let mut connector = MockMarketConnector::new();
        connector.expect_state().return_const(connection);
        let bus = EventBus::shared();
        let gateway = Arc::new(PriceStreamGateway::new(Arc::clone(&bus)));
        HealthServerState::new("0.1.0".to_string(), Arc::new(connector), gateway, bus)
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test_case(ConnectionState::Connected, HealthStatus::Healthy)]
    #[test_case(ConnectionState::Connecting, HealthStatus::Degraded)]
    #[test_case(ConnectionState::Reconnecting, HealthStatus::Degraded)]
    #[test_case(ConnectionState::Disconnected, HealthStatus::Unhealthy)]
    #[test_case(ConnectionState::Idle, HealthStatus::Unhealthy)]
    fn status_follows_connector(connection: ConnectionState, expected: HealthStatus) {
        assert_eq!(determine_health_status(connection), expected);
    }

    #[tokio::test]
    async fn response_reports_feed_and_subscribers() {
        let state = state_with(ConnectionState::Reconnecting);
        let _stream = state.bus.subscribe(EventKind::TickProcessed);

        let response = build_health_response(&state);

        assert_eq!(response.status, HealthStatus::Degraded);
        assert_eq!(response.feed.state, "reconnecting");
        assert!(!response.feed.connected);
        assert_eq!(response.clients, 0);
        assert_eq!(response.subscribers.tick_processed, 1);
        assert_eq!(response.subscribers.tick_received, 0);
    }

    #[tokio::test]
    async fn readiness_requires_connected_feed() {
        let ready = readiness_handler(State(Arc::new(state_with(ConnectionState::Connected))))
            .await
            .into_response();
        assert_eq!(ready.status(), StatusCode::OK);

        let not_ready = readiness_handler(State(Arc::new(state_with(ConnectionState::Connecting))))
            .await
            .into_response();
        assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

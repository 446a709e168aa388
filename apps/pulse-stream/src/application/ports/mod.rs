//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`MarketConnector`]: live feed connection to one upstream exchange
//! - [`ClientSink`]: outbound queue of one WebSocket client
//! - [`TickRenderer`]: terminal output for debounced price updates

use std::sync::Arc;

use rust_decimal::Decimal;

// =============================================================================
// Market Connector
// =============================================================================

/// Lifecycle state of an exchange connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Never started, or explicitly disconnected.
    #[default]
    Idle,
    /// Transport handshake in progress.
    Connecting,
    /// Feed is live.
    Connected,
    /// Connection closed; a reconnect may be scheduled.
    Disconnected,
    /// Waiting for the backoff delay to elapse.
    Reconnecting,
}

impl ConnectionState {
    /// Stable lowercase name used in logs and the health endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Whether the feed is currently live.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live connection to an upstream trade feed.
///
/// Implementations run their session on background tasks; the methods here
/// only trigger transitions and never block on network I/O. Decoded ticks
/// are delivered over the channel handed to the connector at construction.
#[cfg_attr(test, mockall::automock)]
pub trait MarketConnector: Send + Sync {
    /// Start streaming trades for `symbols`.
    ///
    /// No-op while already connecting or connected.
    fn connect(&self, symbols: &[String]);

    /// Stop streaming, cancel any pending reconnect and return to idle.
    fn disconnect(&self);

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;
}

// =============================================================================
// Client Sink
// =============================================================================

/// Outbound handle of one streaming client.
pub trait ClientSink: Send + Sync {
    /// Whether the client can still receive messages.
    fn is_open(&self) -> bool;

    /// Queue a serialized payload without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`PushError`] if the client's buffer is full or closed.
    fn push(&self, payload: Arc<str>) -> Result<(), PushError>;
}

/// Failure to queue a payload for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// Client buffer is at capacity; the payload was dropped.
    #[error("client buffer full")]
    Full,
    /// Client connection has closed.
    #[error("client closed")]
    Closed,
}

// =============================================================================
// Tick Renderer
// =============================================================================

/// Direction of a price move relative to the last displayed price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Price rose.
    Up,
    /// Price fell.
    Down,
    /// Price did not change (or first display).
    Unchanged,
}

impl Direction {
    /// Classify a price delta.
    #[must_use]
    pub fn from_delta(delta: Decimal) -> Self {
        if delta > Decimal::ZERO {
            Self::Up
        } else if delta < Decimal::ZERO {
            Self::Down
        } else {
            Self::Unchanged
        }
    }
}

/// A debounced price update ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTick {
    /// Exchange symbol.
    pub symbol: String,
    /// Price to display.
    pub price: Decimal,
    /// Change versus the last displayed price (zero on first display).
    pub delta: Decimal,
    /// Classification of `delta`.
    pub direction: Direction,
}

/// Output surface for debounced terminal updates.
#[cfg_attr(test, mockall::automock)]
pub trait TickRenderer: Send + Sync {
    /// Display one update.
    fn render(&self, tick: &RenderedTick);
}

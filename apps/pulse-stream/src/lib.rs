#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Pulse Stream - Live Trade Tick Relay
//!
//! Maintains one connection to an exchange's public trade feed, validates and
//! normalizes every tick, and fans the result out to a debounced terminal
//! display and any number of filtered WebSocket clients.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core tick types and rules
//!   - `events`: Pipeline events (received, processed, streamed)
//!   - `tick`: Validation and price normalization
//!   - `subscription`: Client registry and symbol filters
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for the exchange feed, clients and terminal
//!   - `services`: Ingestion, price processing, terminal debounce
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: Exchange connector with reconnect/backoff
//!   - `bus`: In-process publish/subscribe
//!   - `gateway`: WebSocket fan-out with per-client filters
//!   - `console`: Coloured terminal output
//!   - `config`: Environment configuration
//!   - `health`: Health, readiness and metrics endpoints
//!
//! # Data Flow
//!
//! ```text
//! Binance WS --> Connector --mpsc--> Ingestion --TickReceived--> Bus
//!                                                                 |
//!                                   Bus <--TickProcessed-- Processor
//!                                    |
//!                     +--------------+--------------+
//!                     v                             v
//!              Terminal Sink                  Gateway --> Client 1..N
//!              (debounced)                    (filtered)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core tick types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::events::{
    EventKind, PriceEvent, RawTick, TickProcessed, TickReceived, TickStreamed,
};
pub use domain::subscription::{ConnectionId, SymbolFilter};
pub use domain::tick::{TickValidator, ValidationResult, normalize_price};

// Ports and services
pub use application::ports::{
    ClientSink, ConnectionState, Direction, MarketConnector, PushError, RenderedTick,
    TickRenderer,
};
pub use application::services::{MarketIngestionService, PriceProcessor, TerminalSink};

// Infrastructure config
pub use infrastructure::config::{AppConfig, ConfigError};

// Bus
pub use infrastructure::bus::{EventBus, EventStream, SharedEventBus};

// Connector
pub use infrastructure::binance::{BinanceConnector, BinanceConnectorConfig};

// Gateway
pub use infrastructure::gateway::{PriceStreamGateway, SharedGateway};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

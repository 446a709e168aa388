//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Binance WebSocket connector.
pub mod binance;

/// In-process event bus.
pub mod bus;

/// Configuration loading.
pub mod config;

/// Terminal renderer.
pub mod console;

/// WebSocket price streaming gateway.
pub mod gateway;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

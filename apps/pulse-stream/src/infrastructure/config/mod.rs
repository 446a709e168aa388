//! Configuration Module
//!
//! Configuration loading for the relay service.

mod settings;

pub use settings::{
    AppConfig, ConfigError, ConnectorSettings, DEFAULT_SYMBOLS, GatewaySettings, MarketSettings,
    ServerSettings, TerminalSettings,
};

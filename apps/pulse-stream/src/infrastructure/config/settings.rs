//! Relay Configuration Settings
//!
//! Configuration types for the relay, loaded from environment variables.
//! Unparseable numeric values fall back to their defaults.

use std::time::Duration;

use crate::infrastructure::binance::DEFAULT_STREAM_URL;

/// Default symbol set streamed when `PULSE_SYMBOLS` is unset.
pub const DEFAULT_SYMBOLS: &[&str] = &["BTCUSDT", "ETHUSDT", "DOGEUSDT"];

/// HTTP / WebSocket listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Listener port for the WebSocket gateway, health and metrics.
    pub port: u16,
    /// Path of the price streaming WebSocket endpoint.
    pub ws_path: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 3001,
            ws_path: "/prices".to_string(),
        }
    }
}

/// Which market to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSettings {
    /// Source exchange tag stamped on every tick.
    pub exchange: String,
    /// Uppercase symbols to subscribe to.
    pub symbols: Vec<String>,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            exchange: "binance".to_string(),
            symbols: DEFAULT_SYMBOLS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Exchange connector settings.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    /// Combined-stream base URL.
    pub stream_url: String,
    /// Delay before the first reconnection attempt.
    pub reconnect_base_delay: Duration,
    /// Maximum reconnection delay.
    pub reconnect_max_delay: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_multiplier: f64,
    /// Reconnection delay jitter as a fraction (0 = exact delays).
    pub reconnect_jitter: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Capacity of the connector-to-ingestion tick channel.
    pub tick_channel_capacity: usize,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            reconnect_base_delay: Duration::from_millis(1000),
            reconnect_max_delay: Duration::from_secs(512),
            reconnect_multiplier: 2.0,
            reconnect_jitter: 0.0,
            max_reconnect_attempts: 10,
            tick_channel_capacity: 4096,
        }
    }
}

/// Streaming gateway settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Outbound message buffer per WebSocket client.
    pub client_buffer: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self { client_buffer: 256 }
    }
}

/// Terminal display settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSettings {
    /// Whether the terminal display runs.
    pub enabled: bool,
    /// Per-symbol quiet window.
    pub debounce: Duration,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: Duration::from_millis(100),
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Listener settings.
    pub server: ServerSettings,
    /// Market selection.
    pub market: MarketSettings,
    /// Exchange connector settings.
    pub connector: ConnectorSettings,
    /// Gateway settings.
    pub gateway: GatewaySettings,
    /// Terminal display settings.
    pub terminal: TerminalSettings,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol list or exchange tag is empty, or the
    /// WebSocket path is not absolute.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let server = ServerSettings {
            port: env.parse("PORT", ServerSettings::default().port),
            ws_path: env
                .string("PULSE_WS_PATH")
                .unwrap_or_else(|| ServerSettings::default().ws_path),
        };
        if !server.ws_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "PULSE_WS_PATH".to_string(),
                server.ws_path,
            ));
        }

        let market = MarketSettings {
            exchange: env
                .string("PULSE_EXCHANGE")
                .unwrap_or_else(|| MarketSettings::default().exchange),
            symbols: env
                .string("PULSE_SYMBOLS")
                .map_or_else(|| MarketSettings::default().symbols, |v| parse_symbols(&v)),
        };
        if market.exchange.trim().is_empty() {
            return Err(ConfigError::EmptyValue("PULSE_EXCHANGE".to_string()));
        }
        if market.symbols.is_empty() {
            return Err(ConfigError::EmptyValue("PULSE_SYMBOLS".to_string()));
        }

        let defaults = ConnectorSettings::default();
        let connector = ConnectorSettings {
            stream_url: env
                .string("BINANCE_STREAM_URL")
                .unwrap_or(defaults.stream_url),
            reconnect_base_delay: env.parse_millis(
                "PULSE_RECONNECT_BASE_DELAY_MS",
                defaults.reconnect_base_delay,
            ),
            reconnect_max_delay: env.parse_secs(
                "PULSE_RECONNECT_MAX_DELAY_SECS",
                defaults.reconnect_max_delay,
            ),
            reconnect_multiplier: env.parse_f64(
                "PULSE_RECONNECT_MULTIPLIER",
                defaults.reconnect_multiplier,
                |m| m >= 1.0,
            ),
            reconnect_jitter: env.parse_f64(
                "PULSE_RECONNECT_JITTER",
                defaults.reconnect_jitter,
                |j| (0.0..=1.0).contains(&j),
            ),
            max_reconnect_attempts: env.parse(
                "PULSE_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
            tick_channel_capacity: env
                .parse("PULSE_TICK_CHANNEL_CAPACITY", defaults.tick_channel_capacity)
                .max(1),
        };

        let gateway = GatewaySettings {
            client_buffer: env
                .parse("PULSE_CLIENT_BUFFER", GatewaySettings::default().client_buffer)
                .max(1),
        };

        let terminal = TerminalSettings {
            enabled: env.parse_bool("PULSE_TERMINAL_ENABLED", TerminalSettings::default().enabled),
            debounce: env.parse_millis(
                "PULSE_TERMINAL_DEBOUNCE_MS",
                TerminalSettings::default().debounce,
            ),
        };

        Ok(Self {
            server,
            market,
            connector,
            gateway,
            terminal,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("environment variable {0} has invalid value {1:?}")]
    InvalidValue(String, String),
}

/// Split a comma-separated symbol list into trimmed, uppercase, unique symbols.
fn parse_symbols(value: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in value.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.string(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Finite float accepted by `valid`, else `default`.
    fn parse_f64(&self, key: &str, default: f64, valid: impl Fn(f64) -> bool) -> f64 {
        self.string(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && valid(*v))
            .unwrap_or(default)
    }

    fn parse_bool(&self, key: &str, default: bool) -> bool {
        self.string(key)
            .map_or(default, |v| match v.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => default,
            })
    }

    fn parse_secs(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn parse_millis(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}

//! Configuration management
//!
//! Loads configuration from config.toml at startup. All timing and sizing
//! values are configurable to avoid hardcoded constants.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service configuration
///
/// Loaded from config.toml at startup. A missing file yields defaults;
/// a file that exists but fails to parse is an error.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Fan-out publisher settings
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Gateway HTTP/WebSocket server settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Synthetic generator settings
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Consumer-side stream client settings
    #[serde(default)]
    pub client: ClientConfig,
}

/// Fan-out publisher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
    /// Batch flush period in milliseconds
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Liveness probe period in seconds
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Outbound channel capacity per subscriber; a subscriber that falls
    /// this many frames behind is pruned
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Gateway server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Port for the HTTP/WebSocket server
    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Synthetic generator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorConfig {
    /// Aggregate update rate across all symbols, updates per second
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: u32,

    /// PRNG seed; identical seed and symbols reproduce the tick sequence
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Symbols to generate prices for
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Starting mid-price for every symbol
    #[serde(default = "default_start_price")]
    pub start_price: f64,

    /// Prices are clamped to this positive floor
    #[serde(default = "default_price_floor")]
    pub price_floor: f64,

    /// Start the generator automatically at boot
    #[serde(default)]
    pub autostart: bool,
}

/// Consumer-side stream client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Initial reconnect delay in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Reconnect delay cap in milliseconds
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Maximum random jitter added to each delay, milliseconds
    #[serde(default = "default_backoff_jitter_ms")]
    pub backoff_jitter_ms: u64,

    /// Give up after this many failed reconnect attempts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Render commit period in milliseconds
    #[serde(default = "default_commit_interval_ms")]
    pub commit_interval_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: default_rate_per_sec(),
            seed: default_seed(),
            symbols: default_symbols(),
            start_price: default_start_price(),
            price_floor: default_price_floor(),
            autostart: false,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            backoff_jitter_ms: default_backoff_jitter_ms(),
            max_attempts: default_max_attempts(),
            commit_interval_ms: default_commit_interval_ms(),
        }
    }
}

impl PublisherConfig {
    #[inline]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    #[inline]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

fn default_flush_interval_ms() -> u64 {
    50
}

fn default_heartbeat_interval_secs() -> u64 {
    15
}

fn default_channel_capacity() -> usize {
    64
}

fn default_api_port() -> u16 {
    8080
}

fn default_rate_per_sec() -> u32 {
    100
}

fn default_seed() -> u64 {
    42
}

fn default_symbols() -> Vec<String> {
    ["AAPL", "MSFT", "GOOG", "AMZN", "TSLA", "NVDA", "META", "NFLX"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_start_price() -> f64 {
    100.0
}

fn default_price_floor() -> f64 {
    0.01
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_backoff_cap_ms() -> u64 {
    10_000
}

fn default_backoff_jitter_ms() -> u64 {
    200
}

fn default_max_attempts() -> u32 {
    8
}

fn default_commit_interval_ms() -> u64 {
    100
}

impl Config {
    /// Load configuration from config.toml
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, crate::TickError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)
                    .map_err(|e| crate::TickError::Config(e.to_string()))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(crate::TickError::Io(e)),
        }
    }
}

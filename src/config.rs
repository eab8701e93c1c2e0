//! Configuration loading from TOML with validation.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};
use crate::ingest::InstrumentFilter;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub instruments: InstrumentsConfig,
    pub feed: FeedConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the viewer server.
    pub bind: String,
    /// Path of the static viewer page served on `/`.
    pub static_page: String,
    /// Per-viewer delivery timeout for broadcasts, in milliseconds.
    pub send_timeout_ms: u64,
    /// Upper bound on the best-effort feed logout at shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".into(),
            static_page: "static/index.html".into(),
            send_timeout_ms: 1000,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Identifiers for the tracked instruments.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstrumentsConfig {
    /// Feed topic identifying the benchmark index.
    pub index_topic: String,
    /// Display code on outbound index frames.
    pub index_code: String,
    /// Code prefix of the near-month future family.
    pub future_prefix: String,
    /// Display code on outbound future frames (also the tick subscription
    /// code for the near-month continuation contract).
    pub future_code: String,
    /// Option catalog product code-name prefix.
    pub option_product: String,
}

impl Default for InstrumentsConfig {
    fn default() -> Self {
        Self {
            index_topic: "I/TSE/001".into(),
            index_code: "TSE001".into(),
            future_prefix: "TXF".into(),
            future_code: "TXFR1".into(),
            option_product: "TXO".into(),
        }
    }
}

impl InstrumentsConfig {
    #[must_use]
    pub fn filter(&self) -> InstrumentFilter {
        InstrumentFilter {
            index_topic: self.index_topic.clone(),
            index_code: self.index_code.clone(),
            future_prefix: self.future_prefix.clone(),
            future_code: self.future_code.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed driver name. `sim` is built in; brokerage drivers register
    /// under their own names.
    pub driver: String,
    pub sim: SimConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            driver: "sim".into(),
            sim: SimConfig::default(),
        }
    }
}

/// Settings for the simulated feed driver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub base_price: f64,
    pub tick_interval_ms: u64,
    pub expiry_count: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            base_price: 23000.0,
            tick_interval_ms: 500,
            expiry_count: 3,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Config {
    /// Load and validate a config file. A missing file falls back to
    /// defaults so `spreadcast` runs out of the box with the sim driver.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let non_empty = |field: &'static str, value: &str| -> Result<()> {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "cannot be empty".into(),
                }
                .into());
            }
            Ok(())
        };

        non_empty("server.bind", &self.server.bind)?;
        non_empty("instruments.index_topic", &self.instruments.index_topic)?;
        non_empty("instruments.future_prefix", &self.instruments.future_prefix)?;
        non_empty("instruments.option_product", &self.instruments.option_product)?;
        non_empty("feed.driver", &self.feed.driver)?;

        if self.server.send_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.send_timeout_ms",
                reason: "must be positive".into(),
            }
            .into());
        }
        Ok(())
    }
}

//! Configuration management for feewatch
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML file, then `FEEWATCH__SECTION__KEY` environment variables.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Comparator, DEFAULT_EVENT_NAME, MIN_HISTORY_CAPACITY};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "FEEWATCH";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Decision engine configuration
    pub trap: TrapConfig,

    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Metric source configuration
    pub source: SourceConfig,

    /// Relay configuration
    pub relay: RelayConfig,

    /// HTTP API configuration
    pub server: ServerConfig,

    /// Prometheus exporter configuration
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env file is normal
        let _ = dotenvy::dotenv();

        let env = config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true);
        Self::load_with(path, env)
    }

    /// Load configuration from an optional file and an explicit environment source
    pub fn load_with(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "Reading configuration file");
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }

        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.trap.threshold_percent == 0 {
            return Err(Error::config("trap.threshold_percent must be at least 1"));
        }
        if self.scheduler.history_capacity < MIN_HISTORY_CAPACITY {
            return Err(Error::config(format!(
                "scheduler.history_capacity must be at least {MIN_HISTORY_CAPACITY}"
            )));
        }
        if self.scheduler.interval.is_zero() {
            return Err(Error::config("scheduler.interval must be non-zero"));
        }
        if self.relay.channel_capacity == 0 {
            return Err(Error::config("relay.channel_capacity must be at least 1"));
        }
        if self.relay.event_name.trim().is_empty() {
            return Err(Error::config("relay.event_name must not be empty"));
        }
        match self.source.kind {
            SourceKind::Rpc if self.source.url.trim().is_empty() => {
                return Err(Error::config("source.url must not be empty"));
            }
            SourceKind::Rpc if self.source.timeout.is_zero() => {
                return Err(Error::config("source.timeout must be non-zero"));
            }
            SourceKind::Fixed if self.source.base_fee.is_none() => {
                return Err(Error::config("source.base_fee is required for a fixed source"));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Decision engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapConfig {
    /// Minimum relative change, in whole percent
    pub threshold_percent: u32,
    /// Strict (`gt`) or inclusive (`gte`) comparison
    pub comparator: Comparator,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            threshold_percent: 3,
            comparator: Comparator::Gte,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Time between steps
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Number of payloads retained between steps
    pub history_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(12),
            history_capacity: MIN_HISTORY_CAPACITY,
        }
    }
}

/// Kind of metric source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Constant basefee, for dry runs
    Fixed,
    /// Ethereum JSON-RPC endpoint
    #[default]
    Rpc,
}

/// Where samples come from
///
/// Every field has a default so a single override such as
/// `FEEWATCH__SOURCE__URL` is enough on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Which source to build
    pub kind: SourceKind,
    /// Endpoint URL (`rpc`)
    pub url: String,
    /// Request timeout (`rpc`)
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Reported basefee in wei (`fixed`)
    pub base_fee: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Rpc,
            url: "http://localhost:8545".to_string(),
            timeout: Duration::from_secs(10),
            base_fee: None,
        }
    }
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Name attached to emitted events
    pub event_name: String,
    /// Events buffered per subscriber before it lags
    pub channel_capacity: usize,
    /// Destinations events are forwarded to
    pub sinks: Vec<SinkConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            event_name: DEFAULT_EVENT_NAME.to_string(),
            channel_capacity: 64,
            sinks: vec![SinkConfig::Log],
        }
    }
}

/// A relay sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Structured log record
    Log,
    /// HTTP POST of the event envelope
    Webhook {
        /// Target URL
        url: String,
        /// Extra request headers
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// Redis PUBLISH of the event envelope
    Redis {
        /// Redis URL
        url: String,
        /// Channel to publish on
        #[serde(default = "default_redis_channel")]
        channel: String,
    },
}

fn default_redis_channel() -> String {
    "feewatch:alerts".to_string()
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Whether `serve` starts the API
    pub enabled: bool,
    /// Host to bind to
    pub host: String,
    /// HTTP port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to expose metrics
    pub enabled: bool,
    /// Host to bind to
    pub host: String,
    /// Exporter port
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "0.0.0.0".to_string(),
            port: 9090,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

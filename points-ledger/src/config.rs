//! Configuration for the points ledger

use crate::formula::{PointsFormula, SCALING_DIVISOR};
use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Metrics listen address
    pub metrics_listen_addr: String,

    /// Log output format
    pub log_format: LogFormat,

    /// Actor configuration
    pub actor: ActorConfig,

    /// Event stream configuration
    pub events: EventsConfig,

    /// Reward formula configuration
    pub formula: FormulaConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "points-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            metrics_listen_addr: "0.0.0.0:9090".to_string(),
            log_format: LogFormat::Text,
            actor: ActorConfig::default(),
            events: EventsConfig::default(),
            formula: FormulaConfig::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure beyond this)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
        }
    }
}

/// Event stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast buffer per live subscriber
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: crate::events::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Reward formula configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaConfig {
    /// Divisor applied after the participation multiplier
    pub scaling_divisor: u64,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            scaling_divisor: SCALING_DIVISOR,
        }
    }
}

impl FormulaConfig {
    /// Build the configured formula
    pub fn formula(&self) -> crate::Result<PointsFormula> {
        PointsFormula::new(self.scaling_divisor)
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `POINTS_*` environment variables
    pub fn apply_env(&mut self) -> crate::Result<()> {
        if let Ok(addr) = std::env::var("POINTS_METRICS_ADDR") {
            self.metrics_listen_addr = addr;
        }

        if let Ok(format) = std::env::var("POINTS_LOG_FORMAT") {
            self.log_format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => {
                    return Err(crate::Error::Config(format!(
                        "Unknown log format: {}",
                        other
                    )))
                }
            };
        }

        if let Some(capacity) = parse_env("POINTS_MAILBOX_CAPACITY")? {
            self.actor.mailbox_capacity = capacity;
        }

        if let Some(capacity) = parse_env("POINTS_EVENT_CHANNEL_CAPACITY")? {
            self.events.channel_capacity = capacity;
        }

        if let Some(divisor) = parse_env("POINTS_SCALING_DIVISOR")? {
            self.formula.scaling_divisor = divisor;
        }

        self.validate()
    }

    /// Reject values the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be greater than 0".to_string(),
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(crate::Error::Config(
                "events.channel_capacity must be greater than 0".to_string(),
            ));
        }
        self.formula.formula()?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> crate::Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| crate::Error::Config(format!("Invalid value for {}: {}", key, value))),
        Err(_) => Ok(None),
    }
}

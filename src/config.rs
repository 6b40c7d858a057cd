//! Configuration types for paper-risk

use crate::risk::{RiskError, RiskLimits};
use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Risk(#[from] RiskError),
    #[error("Invalid simulation setting: {0}")]
    Simulation(&'static str),
}

/// Root configuration structure
///
/// Every section is optional; missing sections take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub risk: RiskLimits,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Paper execution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Paper cash each user starts with (USD)
    #[serde(default = "default_initial_balance")]
    pub initial_balance_usd: Decimal,

    /// Snapshots older than this are treated as missing (seconds)
    #[serde(default = "default_max_snapshot_age_secs")]
    pub max_snapshot_age_secs: u64,

    /// How often open positions are re-evaluated (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Half-width of the uniform slippage noise (bps)
    #[serde(default = "default_noise_bps")]
    pub noise_bps: Decimal,
}

fn default_initial_balance() -> Decimal {
    Decimal::new(10_000, 0)
}
fn default_max_snapshot_age_secs() -> u64 {
    30
}
fn default_tick_interval_ms() -> u64 {
    1_000
}
fn default_noise_bps() -> Decimal {
    Decimal::new(5, 0)
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_balance_usd: default_initial_balance(),
            max_snapshot_age_secs: default_max_snapshot_age_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            noise_bps: default_noise_bps(),
        }
    }
}

impl SimulationConfig {
    pub fn max_snapshot_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_snapshot_age_secs as i64)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port; no exporter when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.risk.validate()?;
        if self.simulation.initial_balance_usd <= Decimal::ZERO {
            return Err(ConfigError::Simulation("initial_balance_usd must be positive"));
        }
        if self.simulation.max_snapshot_age_secs == 0 {
            return Err(ConfigError::Simulation("max_snapshot_age_secs must be positive"));
        }
        if self.simulation.tick_interval_ms == 0 {
            return Err(ConfigError::Simulation("tick_interval_ms must be positive"));
        }
        if self.simulation.noise_bps < Decimal::ZERO {
            return Err(ConfigError::Simulation("noise_bps must not be negative"));
        }
        Ok(())
    }
}

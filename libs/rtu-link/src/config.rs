//! Link configuration
//!
//! `RtuConfig` is assembled with figment from an optional YAML/TOML/JSON file
//! and `RTU_`-prefixed environment variables (`__` separates nested keys, so
//! `RTU_MASTER__RETRY_COUNT=5` sets `master.retry_count`). Every field has a
//! default, so an empty source is a valid configuration.
//!
//! ```yaml
//! serial:
//!   port: /dev/ttyUSB0
//!   baud_rate: 9600
//!   parity: none
//! master:
//!   timeout_ms: 1000
//!   retry_count: 3
//! slave:
//!   address: 1
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::constants::{effective_timeout, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT};
use crate::error::{Result, RtuError};
use crate::retry::RetryPolicy;
use crate::slave::SlaveIdentity;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "RTU_";

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_retry_count() -> u8 {
    DEFAULT_RETRY_COUNT
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY.as_millis() as u64
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtuConfig {
    pub serial: SerialConfig,
    pub master: MasterConfig,
    pub slave: SlaveConfig,
}

/// Serial line parity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: String,
    pub baud_rate: u32,
    /// 5..=8
    pub data_bits: u8,
    pub parity: Parity,
    /// 1 or 2
    pub stop_bits: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<()> {
        if self.port.is_empty() {
            return Err(RtuError::config("serial.port must not be empty"));
        }
        if self.baud_rate == 0 {
            return Err(RtuError::config("serial.baud_rate must be positive"));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(RtuError::config(format!(
                "serial.data_bits must be 5..=8, got {}",
                self.data_bits
            )));
        }
        if !matches!(self.stop_bits, 1 | 2) {
            return Err(RtuError::config(format!(
                "serial.stop_bits must be 1 or 2, got {}",
                self.stop_bits
            )));
        }
        Ok(())
    }
}

/// Master timing and retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Per transmit/receive timeout; 0 selects the default
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra attempts after a timeout or CRC failure
    #[serde(default = "default_retry_count")]
    pub retry_count: u8,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl MasterConfig {
    pub fn timeout(&self) -> Duration {
        effective_timeout(Duration::from_millis(self.timeout_ms))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count, Duration::from_millis(self.retry_delay_ms))
    }
}

/// Slave identity settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveConfig {
    pub address: u8,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u8,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            address: 1,
            timeout_ms: default_timeout_ms(),
            retry_count: default_retry_count(),
        }
    }
}

impl SlaveConfig {
    /// Validated identity for a responder
    pub fn identity(&self) -> Result<SlaveIdentity> {
        SlaveIdentity::new(
            self.address,
            Duration::from_millis(self.timeout_ms),
            self.retry_count,
        )
    }
}

fn file_provider(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| RtuError::config("Config file must have an extension"))?;

    match extension {
        "toml" => Ok(figment.merge(Toml::file(path))),
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        "json" => Ok(figment.merge(Json::file(path))),
        _ => Err(RtuError::config(format!(
            "Unsupported config file format: {}",
            extension
        ))),
    }
}

fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<RtuConfig> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        if !path.exists() {
            return Err(RtuError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        figment = file_provider(figment, path)?;
    }
    figment = figment.merge(Env::prefixed(env_prefix).split("__"));

    let config: RtuConfig = figment
        .extract()
        .map_err(|e| RtuError::config(format!("Failed to load configuration: {}", e)))?;
    config.serial.validate()?;
    Ok(config)
}

/// Load configuration from defaults, an optional file and the environment
///
/// Priority (highest to lowest):
/// 1. `RTU_*` environment variables
/// 2. The given file
/// 3. Default values
pub fn load_config(path: Option<&Path>) -> Result<RtuConfig> {
    load_with_prefix(path, ENV_PREFIX)
}

/// Load configuration from a specific file only
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<RtuConfig> {
    let figment = file_provider(Figment::new(), path.as_ref())?;
    let config: RtuConfig = figment.extract().map_err(|e| {
        RtuError::config(format!("Failed to load configuration from file: {}", e))
    })?;
    config.serial.validate()?;
    Ok(config)
}

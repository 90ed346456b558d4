//! Configuration file support.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/resus/config.toml`.
//! Clinical thresholds and the template catalog are fixed constants and
//! deliberately not configurable; this file covers ambient concerns only.

use crate::error::{Error, Result};
use crate::types::GlucoseUnit;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub units: UnitsConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Data storage configuration (audit logs, handover exports)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Display unit preferences
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct UnitsConfig {
    #[serde(default)]
    pub glucose: GlucoseUnit,
}

/// Simulation loop parameters for the CLI
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seconds between derived-state recomputations
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("resus")
}

fn default_tick_seconds() -> u64 {
    1
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("resus").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

//! Configuration management for UpChain

use crate::economics::INITIAL_DIFFICULTY;
use crate::error::{LedgerError, Result};
use crate::registry::has_web_scheme;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default = "default_sync_timeout", with = "humantime_serde_compat")]
    pub sync_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_mining_enabled")]
    pub enabled: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            peers: Vec::new(),
            sync_timeout: default_sync_timeout(),
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            enabled: default_mining_enabled(),
        }
    }
}

fn default_difficulty() -> u32 {
    INITIAL_DIFFICULTY
}

fn default_api_port() -> u16 {
    5000
}

fn default_sync_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_mining_enabled() -> bool {
    false
}

/// `sync_timeout = "5s"` style durations.
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger.difficulty == 0 || self.ledger.difficulty > 64 {
            return Err(LedgerError::Config(format!(
                "ledger.difficulty must be between 1 and 64, got {}",
                self.ledger.difficulty
            )));
        }

        if let Some(peer) = self.network.peers.iter().find(|p| !has_web_scheme(p)) {
            return Err(LedgerError::Config(format!(
                "network.peers entry {:?} must start with http:// or https://",
                peer
            )));
        }

        if self.network.sync_timeout.is_zero() {
            return Err(LedgerError::Config("network.sync_timeout must be positive".to_string()));
        }

        Ok(())
    }
}

/// Load `config.toml` from the working directory, falling back to defaults
/// when the file is absent.
pub fn load_config() -> Result<Config> {
    let path = Path::new(DEFAULT_CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    Config::from_path(path)
}

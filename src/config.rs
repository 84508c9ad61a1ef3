//! Configuration management for the mixlink monitor
//!
//! Handles loading, parsing, and validation of YAML configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::protocol::DEFAULT_TCP_PORT;
use crate::state::{EngineOptions, ParameterPath};

/// Highest base channel that still leaves room for the five channel offsets
pub const MAX_BASE_CHANNEL: u8 = 12;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    pub console: ConsoleConfig,
    /// Parameter paths to watch, e.g. `input:0:fader`
    #[serde(default)]
    pub subscriptions: Vec<ParameterPath>,
}

/// Console connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsoleConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// MIDI channel (1-16) the console's address layout starts at
    #[serde(default = "default_base_channel")]
    pub base_channel: u8,
}

impl MonitorConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: MonitorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.console.host.is_empty() {
            anyhow::bail!("console host cannot be empty");
        }
        if self.console.port == 0 {
            anyhow::bail!("console port cannot be 0");
        }
        if !(1..=MAX_BASE_CHANNEL).contains(&self.console.base_channel) {
            anyhow::bail!(
                "console base_channel {} is invalid (must be 1-{})",
                self.console.base_channel,
                MAX_BASE_CHANNEL
            );
        }
        Ok(())
    }

    /// Engine settings derived from this configuration
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            base_channel: self.console.base_channel.saturating_sub(1),
        }
    }

    /// `host:port` of the console
    pub fn address(&self) -> String {
        format!("{}:{}", self.console.host, self.console.port)
    }
}

fn default_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_base_channel() -> u8 {
    1
}

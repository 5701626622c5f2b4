//! Configuration management for OSC Recorder
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub receiver: ReceiverConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// UDP receive session settings
///
/// Fixed for the lifetime of one session; changing it requires a restart
/// of the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReceiverConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub auto_add_addresses: bool,
}

/// Receive loop cadence
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollConfig {
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default = "default_max_datagrams")]
    pub max_datagrams_per_poll: usize,
}

/// Time-series recording settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RecorderConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_recording_output")]
    pub output: PathBuf,
}

/// Live values display
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_rows")]
    pub max_rows: usize,
    #[serde(default = "default_monitor_refresh")]
    pub refresh_ms: u64,
}

/// Value store persistence and pre-registered addresses
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<AddressSeed>,
}

/// Address registered at startup (and on reload)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddressSeed {
    pub address: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            auto_add_addresses: true,
        }
    }
}

impl ReceiverConfig {
    /// `bind_address:port` as shown to users
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            max_datagrams_per_poll: default_max_datagrams(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            output: default_recording_output(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_rows: default_monitor_rows(),
            refresh_ms: default_monitor_refresh(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty file means "all defaults"
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.receiver.bind_address.trim().is_empty() {
            anyhow::bail!("receiver.bind_address cannot be empty");
        }
        if self.receiver.port == 0 {
            anyhow::bail!("receiver.port must be between 1 and 65535");
        }

        if self.poll.tick_hz == 0 || self.poll.tick_hz > 1000 {
            anyhow::bail!(
                "poll.tick_hz {} is invalid (must be 1-1000)",
                self.poll.tick_hz
            );
        }
        if self.poll.max_datagrams_per_poll == 0 {
            anyhow::bail!("poll.max_datagrams_per_poll must be at least 1");
        }

        if self.recorder.fps == 0 {
            anyhow::bail!("recorder.fps must be at least 1");
        }
        if self.monitor.max_rows == 0 {
            anyhow::bail!("monitor.max_rows must be at least 1");
        }

        for (idx, seed) in self.store.addresses.iter().enumerate() {
            if seed.address.trim().is_empty() {
                anyhow::bail!("store.addresses[{}] address cannot be empty", idx);
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_bind_address() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 9000 }
fn default_true() -> bool { true }
fn default_tick_hz() -> u32 { 60 }
fn default_max_datagrams() -> usize { 4096 }
fn default_fps() -> u32 { 24 }
fn default_recording_output() -> PathBuf { PathBuf::from("osc-recording.csv") }
fn default_monitor_rows() -> usize { 12 }
fn default_monitor_refresh() -> u64 { 1000 }

//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - Environment variables (through the CLI layer)
//! - CLI arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod types;

pub use types::{LoggingConfig, StagingConfig, TransferConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Staging directory configuration
    #[serde(default)]
    pub staging: StagingConfig,
    /// Transfer policy
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(root) = &self.staging.root_dir {
            if !root.is_absolute() {
                anyhow::bail!("Staging root must be absolute: {:?}", root);
            }
        }

        if self.staging.block_enabled && !self.staging.block_control.is_absolute() {
            anyhow::bail!(
                "Block control path must be absolute: {:?}",
                self.staging.block_control
            );
        }

        if self.transfer.max_payload_size == 0 {
            anyhow::bail!("max_payload_size must be greater than zero");
        }
        if u32::try_from(self.transfer.max_payload_size).is_err() {
            anyhow::bail!(
                "max_payload_size {} exceeds the {} byte item limit",
                self.transfer.max_payload_size,
                u32::MAX
            );
        }

        if self.transfer.event_queue_depth == 0 {
            anyhow::bail!("event_queue_depth must be greater than zero");
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(
        mut self,
        staging_root: Option<PathBuf>,
        no_block: bool,
        local_full_paths: bool,
    ) -> Self {
        if let Some(root) = staging_root {
            self.staging.root_dir = Some(root);
        }
        if no_block {
            self.staging.block_enabled = false;
        }
        if local_full_paths {
            self.transfer.local_full_paths = true;
        }

        self
    }
}

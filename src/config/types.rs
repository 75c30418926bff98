//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::staging::block::DEFAULT_BLOCK_CONTROL;
use crate::staging::default_staging_root;

/// Staging directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Root for per-transfer directories (None = runtime dir default)
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Block staging directories while they are populated
    #[serde(default = "default_true")]
    pub block_enabled: bool,

    /// vmblock-fuse control file
    #[serde(default = "default_block_control")]
    pub block_control: PathBuf,
}

impl StagingConfig {
    /// Configured root, or the per-user runtime default
    pub fn resolved_root(&self) -> PathBuf {
        self.root_dir.clone().unwrap_or_else(default_staging_root)
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            block_enabled: true,
            block_control: default_block_control(),
        }
    }
}

/// Transfer policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Accept file lists
    #[serde(default = "default_true")]
    pub enable_files: bool,

    /// Accept rich text items
    #[serde(default = "default_true")]
    pub enable_rich_text: bool,

    /// Encode full paths in guest-native form instead of cross-platform names
    #[serde(default)]
    pub local_full_paths: bool,

    /// Maximum accepted payload size in bytes
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: usize,

    /// Capacity of the event queue
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            enable_files: true,
            enable_rich_text: true,
            local_full_paths: false,
            max_payload_size: default_max_payload_size(),
            event_queue_depth: default_event_queue_depth(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("pretty", "compact", "json")
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log file (None = console only)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_block_control() -> PathBuf {
    PathBuf::from(DEFAULT_BLOCK_CONTROL)
}

fn default_max_payload_size() -> usize {
    16 * 1024 * 1024 // 16 MiB
}

fn default_event_queue_depth() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

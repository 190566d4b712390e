//! Configuration loading and management
//!
//! Handles parsing of `.taskflow.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Notification feed configuration
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Board and dashboard view configuration
    #[serde(default)]
    pub board: BoardConfig,

    /// Retry policy for transient store failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notifications: NotificationsConfig::default(),
            board: BoardConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Notification feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Maximum number of notifications kept in the live feed
    #[serde(default = "default_feed_window")]
    pub feed_window: usize,

    /// Maximum number of characters carried into a comment preview
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_feed_window() -> usize {
    20
}

fn default_preview_chars() -> usize {
    50
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            feed_window: default_feed_window(),
            preview_chars: default_preview_chars(),
        }
    }
}

/// Board and dashboard view configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Maximum number of entries in the recent-tasks view
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_recent_limit() -> usize {
    5
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
        }
    }
}

/// Retry policy for transient store failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per write, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    150
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `.taskflow.toml` file
    pub fn load(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(".taskflow.toml");
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.notifications.feed_window == 0 {
            return Err(Error::InvalidConfig(
                "notifications.feed_window must be >= 1".to_string(),
            ));
        }
        if self.notifications.preview_chars == 0 {
            return Err(Error::InvalidConfig(
                "notifications.preview_chars must be >= 1".to_string(),
            ));
        }
        if self.board.recent_limit == 0 {
            return Err(Error::InvalidConfig(
                "board.recent_limit must be >= 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry.max_attempts must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

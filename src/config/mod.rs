//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - Environment variables
//! - CLI arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod types;

pub use types::{CaptureConfig, HistoryConfig, LoggingConfig, ServerConfig};

use crate::clipboard::CaptureLimits;
use crate::history::HistoryLimits;
use crate::protocol::messages::ENTRY_HEADER_LEN;
use crate::protocol::{MAX_FRAME_SIZE_LIMIT, MIN_FRAME_SIZE};

/// Socket file name under the runtime directory
pub const SOCKET_FILE_NAME: &str = "lamco-clip.sock";

/// Environment variable naming the socket path
pub const SOCKET_ENV: &str = "LAMCO_CLIP_SOCKET";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Socket server configuration
    pub server: ServerConfig,
    /// History store configuration
    pub history: HistoryConfig,
    /// Capture configuration
    pub capture: CaptureConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Default config file location (`$XDG_CONFIG_HOME/lamco-clip/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lamco-clip").join("config.toml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.history.capacity == 0 {
            anyhow::bail!("history.capacity must be at least 1");
        }
        if self.history.max_entry_size == 0 {
            anyhow::bail!("history.max_entry_size must be greater than 0");
        }
        if self.history.max_total_bytes == 0 {
            anyhow::bail!("history.max_total_bytes must be greater than 0");
        }
        if self.history.max_entry_size > self.history.max_total_bytes {
            anyhow::bail!(
                "history.max_entry_size ({}) exceeds history.max_total_bytes ({})",
                self.history.max_entry_size,
                self.history.max_total_bytes
            );
        }

        if self.server.max_frame_size < MIN_FRAME_SIZE {
            anyhow::bail!(
                "server.max_frame_size ({}) must be at least {}",
                self.server.max_frame_size,
                MIN_FRAME_SIZE
            );
        }
        if self.server.max_frame_size > MAX_FRAME_SIZE_LIMIT {
            anyhow::bail!(
                "server.max_frame_size ({}) exceeds the protocol limit of {}",
                self.server.max_frame_size,
                MAX_FRAME_SIZE_LIMIT
            );
        }
        // A stored entry must come back out through GET
        if self.history.max_entry_size.saturating_add(ENTRY_HEADER_LEN) > self.server.max_frame_size {
            anyhow::bail!(
                "history.max_entry_size ({}) does not fit in server.max_frame_size ({}); \
                 GET responses carry {} extra header bytes",
                self.history.max_entry_size,
                self.server.max_frame_size,
                ENTRY_HEADER_LEN
            );
        }
        if self.server.socket_mode > 0o777 {
            anyhow::bail!("Invalid socket mode: {:o}", self.server.socket_mode);
        }

        if self.capture.read_timeout_ms == 0 {
            anyhow::bail!("capture.read_timeout_ms must be greater than 0");
        }
        if self.capture.publish_timeout_ms == 0 {
            anyhow::bail!("capture.publish_timeout_ms must be greater than 0");
        }

        match self.capture.backend.as_str() {
            "memory" => {}
            "wayland" if cfg!(feature = "wayland") => {}
            "wayland" => anyhow::bail!("Wayland backend not compiled in (enable feature \"wayland\")"),
            _ => anyhow::bail!("Invalid clipboard backend: {}", self.capture.backend),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        Ok(())
    }

    /// Override configuration with CLI arguments
    pub fn with_overrides(mut self, socket: Option<PathBuf>, capacity: Option<usize>) -> Self {
        if let Some(socket) = socket {
            self.server.socket_path = Some(socket);
        }
        if let Some(capacity) = capacity {
            self.history.capacity = capacity;
        }

        self
    }

    /// Socket path to bind
    pub fn socket_path(&self) -> Result<PathBuf> {
        match &self.server.socket_path {
            Some(path) => Ok(path.clone()),
            None => default_socket_path(),
        }
    }

    /// History store limits
    pub fn history_limits(&self) -> HistoryLimits {
        HistoryLimits {
            capacity: self.history.capacity,
            max_total_bytes: self.history.max_total_bytes,
            preview_chars: self.history.preview_chars,
        }
    }

    /// Capture limits
    pub fn capture_limits(&self) -> CaptureLimits {
        CaptureLimits {
            max_entry_size: self.history.max_entry_size,
            read_timeout: Duration::from_millis(self.capture.read_timeout_ms),
        }
    }

    /// Publish timeout for selections
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.capture.publish_timeout_ms)
    }
}

/// `$XDG_RUNTIME_DIR/lamco-clip.sock`
pub fn default_socket_path() -> Result<PathBuf> {
    dirs::runtime_dir()
        .map(|dir| dir.join(SOCKET_FILE_NAME))
        .context("XDG_RUNTIME_DIR is not set; pass --socket or set LAMCO_CLIP_SOCKET")
}

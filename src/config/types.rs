//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clipboard::formats::{DEFAULT_MAX_ENTRY_SIZE, DEFAULT_READ_TIMEOUT_MS};
use crate::clipboard::selection::DEFAULT_PUBLISH_TIMEOUT_MS;
use crate::history::store::{DEFAULT_CAPACITY, DEFAULT_MAX_TOTAL_BYTES, DEFAULT_PREVIEW_CHARS};
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Socket server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket path (None = `$XDG_RUNTIME_DIR/lamco-clip.sock`)
    pub socket_path: Option<PathBuf>,

    /// Permission bits applied to the socket file
    pub socket_mode: u32,

    /// Largest frame accepted from or sent to a client
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            socket_mode: 0o600,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// History store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of entries kept
    pub capacity: usize,

    /// Largest single payload captured, in bytes
    pub max_entry_size: usize,

    /// Byte budget across all payloads
    pub max_total_bytes: usize,

    /// Characters shown in text previews
    pub preview_chars: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Clipboard backend ("wayland", "memory")
    pub backend: String,

    /// Upper bound on reading one clipboard offer
    pub read_timeout_ms: u64,

    /// Upper bound on publishing a selected entry
    pub publish_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: default_backend().to_string(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            publish_timeout_ms: DEFAULT_PUBLISH_TIMEOUT_MS,
        }
    }
}

fn default_backend() -> &'static str {
    if cfg!(feature = "wayland") {
        "wayland"
    } else {
        "memory"
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    pub level: String,

    /// Output format ("pretty", "compact", "json")
    pub format: String,

    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_file: None,
        }
    }
}

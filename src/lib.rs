//! # lamco-clip-history
//!
//! Clipboard history daemon for Wayland desktops.
//!
//! The daemon watches the clipboard, keeps a bounded, deduplicated history of
//! text and image snippets in memory, and serves it to local clients over a
//! Unix socket.
//!
//! # Architecture
//!
//! ```text
//! lamco-clipd
//!   ├─> CaptureLoop (change notification → negotiate → read → insert)
//!   ├─> HistoryStore (newest-first, capacity- and byte-bounded, dedup by SHA-256)
//!   ├─> SelectionController (stored entry → clipboard)
//!   └─> Socket server (one task per client)
//! ```
//!
//! # Data Flow
//!
//! **Capture Path:** Compositor → `wl-paste --watch lamco-clipctl notify` → NOTIFY →
//! CaptureLoop → ClipboardBackend::read → HistoryStore
//!
//! **Query Path:** Client → LIST/GET → HistoryStore → Client
//!
//! **Select Path:** Client → SELECT → SelectionController → ClipboardBackend::publish →
//! Compositor → NOTIFY → CaptureLoop → HistoryStore (promote)

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Clipboard backends, negotiation, capture and selection
pub mod clipboard;

/// Daemon client
pub mod client;

/// Daemon configuration
pub mod config;

/// History entries and the history store
pub mod history;

/// Socket wire protocol
pub mod protocol;

/// Socket server
pub mod server;

/// Utility functions
pub mod utils;

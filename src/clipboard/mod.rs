//! Clipboard Capture and Selection
//!
//! Everything that touches the system clipboard lives here: the backend seam,
//! content negotiation, the capture loop and re-selection of stored entries.
//!
//! # Data Flow
//!
//! ```text
//! Compositor             Daemon                                          History
//! ━━━━━━━━━━             ━━━━━━                                          ━━━━━━━
//!
//! Copy (Ctrl+C)
//!   └─> wl-paste --watch ─> NOTIFY ─> ChangeNotifier ─> CaptureLoop
//!                                                          │
//!                                                          ├─> negotiate (formats)
//!                                                          ├─> ClipboardBackend::read
//!                                                          │
//!                                                          └──────────────> HistoryStore::insert
//!
//! Paste (Ctrl+V) <── ClipboardBackend::publish <── SelectionController <── HistoryStore::get
//! ```
//!
//! A publish makes the compositor announce a new selection, which comes back
//! as a notification for byte-identical content. The store promotes the
//! existing entry and the history stays the same length.

pub mod backend;
pub mod capture;
pub mod error;
pub mod formats;
pub mod selection;

pub use backend::{ClipboardBackend, MemoryClipboard};
#[cfg(feature = "wayland")]
pub use backend::WaylandClipboard;
pub use capture::{
    capture_change, CaptureLoop, CaptureMonitor, CaptureState, CaptureStats, ChangeNotifier,
    ClipboardChange,
};
pub use error::{classify_error, ClipboardError, ErrorType, Result};
pub use formats::{capture, mime_essence, negotiate, CaptureLimits, Captured, Negotiated};
pub use selection::{SelectError, SelectionController};

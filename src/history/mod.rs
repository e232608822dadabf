//! Clipboard history
//!
//! Typed entries and the bounded store that holds them.
//!
//! ```text
//! capture loop ──insert──▶ HistoryStore ◀──list/get/remove/clear── client connections
//!                               │
//!                               └──get──▶ SelectionController ──publish──▶ clipboard
//! ```

pub mod entry;
pub mod store;

pub use entry::{make_preview, now_millis, ContentType, Entry, EntrySummary};
pub use store::{content_digest, HistoryLimits, HistoryStore, InsertOutcome};

use thiserror::Error;

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// History store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// No entry with this id is currently stored
    #[error("No history entry with id {0}")]
    NotFound(u64),
}

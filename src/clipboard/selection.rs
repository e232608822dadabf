//! Selection
//!
//! Re-activates a stored entry as the current clipboard content.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clipboard::backend::ClipboardBackend;
use crate::clipboard::error::ClipboardError;
use crate::history::{Entry, HistoryError, HistoryStore};

/// Default publish timeout
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 2000;

/// Selection errors
#[derive(Error, Debug)]
pub enum SelectError {
    /// No entry with this id
    #[error("No history entry with id {0}")]
    NotFound(u64),

    /// The clipboard sink rejected the content
    #[error("Failed to publish entry: {0}")]
    Publish(#[source] ClipboardError),
}

impl From<HistoryError> for SelectError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::NotFound(id) => Self::NotFound(id),
        }
    }
}

/// Publishes stored entries through the clipboard backend
pub struct SelectionController {
    store: Arc<HistoryStore>,
    backend: Arc<dyn ClipboardBackend>,
    publish_timeout: Duration,
}

impl SelectionController {
    /// Create a controller
    pub fn new(
        store: Arc<HistoryStore>,
        backend: Arc<dyn ClipboardBackend>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            store,
            backend,
            publish_timeout,
        }
    }

    /// Make entry `id` the current clipboard content
    ///
    /// The entry is copied out under the store lock and published exactly
    /// once. The history itself is left untouched; the change notification
    /// the publish triggers promotes the entry through the normal capture path.
    pub async fn select(&self, id: u64) -> Result<Entry, SelectError> {
        let entry = self.store.get(id)?;

        debug!(
            "Publishing entry {} ({}, {} bytes)",
            entry.id,
            entry.content_type,
            entry.size()
        );

        let publish = self
            .backend
            .publish(entry.content_type, entry.payload.clone());

        match tokio::time::timeout(self.publish_timeout, publish).await {
            Ok(Ok(())) => {
                info!("Selected entry {}", entry.id);
                Ok(entry)
            }
            Ok(Err(e)) => {
                warn!("Publishing entry {} failed: {}", entry.id, e);
                Err(SelectError::Publish(e))
            }
            Err(_) => {
                let ms = self.publish_timeout.as_millis() as u64;
                warn!("Publishing entry {} timed out after {}ms", entry.id, ms);
                Err(SelectError::Publish(ClipboardError::PublishTimeout(ms)))
            }
        }
    }
}

//! Clipboard Backends
//!
//! [`ClipboardBackend`] is the seam between the history core and whatever owns
//! the system clipboard. The core only ever asks three things of it: which
//! identifiers are on offer, the bytes for one identifier, and to install new
//! content.
//!
//! - [`WaylandClipboard`] talks to the compositor through the wlr
//!   data-control protocol (feature `wayland`).
//! - [`MemoryClipboard`] keeps the clipboard in process, for headless runs and
//!   tests.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::clipboard::capture::{ChangeNotifier, ClipboardChange};
use crate::clipboard::error::{ClipboardError, Result};
use crate::history::ContentType;

/// System clipboard access
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipboardBackend: Send + Sync {
    /// Identifiers currently offered by the clipboard owner
    async fn offered_types(&self) -> Result<Vec<String>>;

    /// Read at most `limit` bytes of the content offered as `mime_type`
    async fn read(&self, mime_type: &str, limit: usize) -> Result<Vec<u8>>;

    /// Take clipboard ownership and serve `payload` as `content_type`
    async fn publish(&self, content_type: ContentType, payload: Bytes) -> Result<()>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Read at most `limit` bytes from `reader` until EOF
///
/// The reader is owned by the returned future, so dropping the future (on
/// timeout or when a newer change supersedes the capture) closes it and ends
/// the transfer.
#[cfg_attr(not(feature = "wayland"), allow(dead_code))]
pub(crate) async fn read_bounded<R>(reader: R, mime_type: &str, limit: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut data = Vec::new();
    reader
        .take(limit as u64)
        .read_to_end(&mut data)
        .await
        .map_err(|e| ClipboardError::ReadFailure {
            mime_type: mime_type.to_string(),
            reason: e.to_string(),
        })?;

    trace!("Read {} bytes of {}", data.len(), mime_type);
    Ok(data)
}

// =============================================================================
// Wayland (wlr data-control)
// =============================================================================

#[cfg(feature = "wayland")]
pub use wayland::WaylandClipboard;

#[cfg(feature = "wayland")]
mod wayland {
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::os::fd::OwnedFd;
    use tokio::net::unix::pipe;
    use tracing::debug;
    use wl_clipboard_rs::{copy, paste};

    use super::{read_bounded, ClipboardBackend};
    use crate::clipboard::error::{ClipboardError, Result};
    use crate::history::ContentType;

    /// Regular clipboard of the default seat via wl-clipboard-rs
    ///
    /// Wayland round-trips block, so they run on the blocking pool. Transfer
    /// pipes are handed to tokio and read without holding a pool thread.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WaylandClipboard;

    impl WaylandClipboard {
        /// Create the backend
        pub fn new() -> Self {
            Self
        }
    }

    async fn blocking<T, F>(f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| ClipboardError::Worker(e.to_string()))?
    }

    #[async_trait]
    impl ClipboardBackend for WaylandClipboard {
        async fn offered_types(&self) -> Result<Vec<String>> {
            blocking(|| {
                match paste::get_mime_types(paste::ClipboardType::Regular, paste::Seat::Unspecified)
                {
                    Ok(types) => {
                        let mut types: Vec<String> = types.into_iter().collect();
                        types.sort();
                        Ok(types)
                    }
                    Err(paste::Error::ClipboardEmpty) => Ok(Vec::new()),
                    Err(e) => Err(ClipboardError::Backend(e.to_string())),
                }
            })
            .await
        }

        async fn read(&self, mime_type: &str, limit: usize) -> Result<Vec<u8>> {
            let requested = mime_type.to_string();

            let fd = blocking(move || {
                let (reader, _) = paste::get_contents(
                    paste::ClipboardType::Regular,
                    paste::Seat::Unspecified,
                    paste::MimeType::Specific(&requested),
                )
                .map_err(|e| ClipboardError::ReadFailure {
                    mime_type: requested.clone(),
                    reason: e.to_string(),
                })?;
                Ok(OwnedFd::from(reader))
            })
            .await?;

            let pipe = pipe::Receiver::from_owned_fd(fd).map_err(|e| ClipboardError::ReadFailure {
                mime_type: mime_type.to_string(),
                reason: e.to_string(),
            })?;

            read_bounded(pipe, mime_type, limit).await
        }

        async fn publish(&self, content_type: ContentType, payload: Bytes) -> Result<()> {
            blocking(move || {
                let mime_type = match content_type {
                    // Offers the usual text aliases alongside text/plain
                    ContentType::Text => copy::MimeType::Text,
                    other => copy::MimeType::Specific(other.mime_type().to_string()),
                };

                let mut opts = copy::Options::new();
                opts.clipboard(copy::ClipboardType::Regular);

                copy::copy(
                    opts,
                    copy::Source::Bytes(payload.to_vec().into_boxed_slice()),
                    mime_type,
                )
                .map_err(|e| ClipboardError::PublishFailure(e.to_string()))?;

                debug!("Published {} to Wayland clipboard", content_type);
                Ok(())
            })
            .await
        }

        fn name(&self) -> &'static str {
            "wayland"
        }
    }
}

// =============================================================================
// In-process clipboard
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    /// Offered identifiers with their bytes, in offer order
    offers: Vec<(String, Bytes)>,
    /// Every successful publish, oldest first
    published: Vec<(ContentType, Bytes)>,
    fail_publish: bool,
    fail_queries: bool,
}

/// Clipboard that lives in the daemon process
///
/// Publishing replaces the offer with the published content. When a
/// [`ChangeNotifier`] is attached, each publish also raises a change
/// notification the way a compositor would after a selection change.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    state: Mutex<MemoryState>,
    notifier: Mutex<Option<ChangeNotifier>>,
    read_delay: Option<Duration>,
}

impl MemoryClipboard {
    /// Create an empty clipboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every read, simulating a slow clipboard owner
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Raise a change notification after each publish
    pub fn attach_notifier(&self, notifier: ChangeNotifier) {
        *self.notifier.lock() = Some(notifier);
    }

    /// Replace the clipboard with a single offered identifier
    pub fn set_contents(&self, mime_type: impl Into<String>, data: impl Into<Bytes>) {
        self.set_offers(vec![(mime_type.into(), data.into())]);
    }

    /// Replace the clipboard with several offered identifiers
    pub fn set_offers(&self, offers: Vec<(String, Bytes)>) {
        self.state.lock().offers = offers;
    }

    /// Make subsequent publishes fail
    pub fn set_fail_publish(&self, fail: bool) {
        self.state.lock().fail_publish = fail;
    }

    /// Make subsequent `offered_types` queries fail
    pub fn set_fail_queries(&self, fail: bool) {
        self.state.lock().fail_queries = fail;
    }

    /// Every published payload so far
    pub fn published(&self) -> Vec<(ContentType, Bytes)> {
        self.state.lock().published.clone()
    }

    /// Number of successful publishes
    pub fn publish_count(&self) -> usize {
        self.state.lock().published.len()
    }
}

#[async_trait]
impl ClipboardBackend for MemoryClipboard {
    async fn offered_types(&self) -> Result<Vec<String>> {
        let state = self.state.lock();
        if state.fail_queries {
            return Err(ClipboardError::Backend(
                "memory clipboard rejected query".to_string(),
            ));
        }
        Ok(state.offers.iter().map(|(mime, _)| mime.clone()).collect())
    }

    async fn read(&self, mime_type: &str, limit: usize) -> Result<Vec<u8>> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        let (_, data) = state
            .offers
            .iter()
            .find(|(offered, _)| offered == mime_type)
            .ok_or_else(|| ClipboardError::ReadFailure {
                mime_type: mime_type.to_string(),
                reason: "identifier no longer offered".to_string(),
            })?;

        trace!("Memory clipboard read {} ({} bytes)", mime_type, data.len());
        Ok(data[..data.len().min(limit)].to_vec())
    }

    async fn publish(&self, content_type: ContentType, payload: Bytes) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.fail_publish {
                return Err(ClipboardError::PublishFailure(
                    "memory clipboard rejected publish".to_string(),
                ));
            }
            state.offers = vec![(content_type.mime_type().to_string(), payload.clone())];
            state.published.push((content_type, payload));
        }

        let notifier = self.notifier.lock().clone();
        if let Some(notifier) = notifier {
            notifier.notify(ClipboardChange::new(vec![content_type
                .mime_type()
                .to_string()]));
        }

        debug!("Published {} to memory clipboard", content_type);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

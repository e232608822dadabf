//! Capture Loop
//!
//! Turns clipboard change notifications into history entries.
//!
//! # States
//!
//! ```text
//!            change                      read done / failed
//!   Idle ─────────────▶ Capturing ─────────────────────────▶ Idle
//!                        │     ▲
//!                        └─────┘
//!                     newer change: abandon read, restart with latest offer
//! ```
//!
//! Notifications travel through a `watch` channel that only ever holds the
//! most recent [`ClipboardChange`]. A burst of copies while a slow image read
//! is in flight therefore collapses into one restart with the newest offer.
//!
//! Content the daemon republishes itself comes back through the same path.
//! The store's dedup-and-promote makes that capture a no-op for ordering
//! purposes, so there is no separate "ignore our own writes" flag.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::clipboard::backend::ClipboardBackend;
use crate::clipboard::error::{classify_error, ErrorType, Result};
use crate::clipboard::formats::{capture, CaptureLimits};
use crate::history::{HistoryStore, InsertOutcome};

/// A clipboard change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardChange {
    /// Identifiers offered by the new clipboard owner
    pub mime_types: Vec<String>,
}

impl ClipboardChange {
    /// Create a change notification
    pub fn new(mime_types: Vec<String>) -> Self {
        Self { mime_types }
    }
}

/// Sending half of the change channel
///
/// Cheap to clone. The capture loop stops once every notifier is dropped.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: Arc<watch::Sender<Option<ClipboardChange>>>,
}

impl ChangeNotifier {
    /// Create a notifier and the receiver a [`CaptureLoop`] consumes
    pub fn channel() -> (Self, watch::Receiver<Option<ClipboardChange>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Replace any pending change with `change`
    ///
    /// Returns false if no capture loop is listening.
    pub fn notify(&self, change: ClipboardChange) -> bool {
        trace!("Clipboard change: {:?}", change.mime_types);
        self.tx.send_replace(Some(change));
        !self.tx.is_closed()
    }
}

/// Capture loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for a notification
    Idle,
    /// Negotiating and reading offered content
    Capturing,
}

/// Capture outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// New entries stored
    pub stored: u64,
    /// Captures that matched an existing entry and promoted it
    pub promoted: u64,
    /// Notifications offering nothing supported
    pub unsupported: u64,
    /// Reads that failed, timed out or produced unstorable data
    pub failed: u64,
    /// Captures abandoned for a newer notification
    pub superseded: u64,
}

#[derive(Debug)]
struct Status {
    state: CaptureState,
    stats: CaptureStats,
}

/// Read-only view of a running capture loop
#[derive(Debug, Clone)]
pub struct CaptureMonitor {
    status: Arc<Mutex<Status>>,
}

impl CaptureMonitor {
    /// Current state
    pub fn state(&self) -> CaptureState {
        self.status.lock().state
    }

    /// Counters so far
    pub fn stats(&self) -> CaptureStats {
        self.status.lock().stats
    }

    fn set_state(&self, state: CaptureState) {
        self.status.lock().state = state;
    }

    fn record(&self, result: &Result<InsertOutcome>) {
        let mut status = self.status.lock();
        match result {
            Ok(InsertOutcome::Inserted { .. }) => status.stats.stored += 1,
            Ok(InsertOutcome::Promoted { .. }) => status.stats.promoted += 1,
            Err(e) if e.is_benign() => status.stats.unsupported += 1,
            Err(_) => status.stats.failed += 1,
        }
    }

    fn record_superseded(&self) {
        self.status.lock().stats.superseded += 1;
    }
}

enum Step {
    Shutdown,
    Superseded,
    Finished {
        result: Result<InsertOutcome>,
        notifiers_gone: bool,
    },
}

/// Negotiate, read and store the content described by `change`
pub async fn capture_change(
    backend: &dyn ClipboardBackend,
    store: &HistoryStore,
    limits: &CaptureLimits,
    change: &ClipboardChange,
) -> Result<InsertOutcome> {
    let captured = capture(backend, &change.mime_types, limits).await?;
    Ok(store.insert(captured.content_type, captured.payload))
}

/// Consumes change notifications and feeds the history store
pub struct CaptureLoop {
    backend: Arc<dyn ClipboardBackend>,
    store: Arc<HistoryStore>,
    limits: CaptureLimits,
    changes: watch::Receiver<Option<ClipboardChange>>,
    monitor: CaptureMonitor,
}

impl CaptureLoop {
    /// Create a capture loop reading from `changes`
    pub fn new(
        backend: Arc<dyn ClipboardBackend>,
        store: Arc<HistoryStore>,
        limits: CaptureLimits,
        changes: watch::Receiver<Option<ClipboardChange>>,
    ) -> Self {
        Self {
            backend,
            store,
            limits,
            changes,
            monitor: CaptureMonitor {
                status: Arc::new(Mutex::new(Status {
                    state: CaptureState::Idle,
                    stats: CaptureStats::default(),
                })),
            },
        }
    }

    /// Handle for observing state and counters after the loop is spawned
    pub fn monitor(&self) -> CaptureMonitor {
        self.monitor.clone()
    }

    /// Capture one change directly, bypassing the notification channel
    pub async fn capture_once(&self, change: &ClipboardChange) -> Result<InsertOutcome> {
        let result = capture_change(self.backend.as_ref(), &self.store, &self.limits, change).await;
        self.report(&result);
        result
    }

    fn report(&self, result: &Result<InsertOutcome>) {
        self.monitor.record(result);

        match result {
            Ok(InsertOutcome::Inserted { entry, .. }) => {
                info!(
                    "Captured entry {} ({}, {} bytes)",
                    entry.id,
                    entry.content_type,
                    entry.size()
                );
            }
            Ok(InsertOutcome::Promoted { entry, .. }) => {
                debug!("Capture matched entry {}, promoted", entry.id);
            }
            Err(e) => match classify_error(e) {
                ErrorType::Unsupported => debug!("Skipping capture: {}", e),
                ErrorType::Read | ErrorType::DataValidation => warn!("Capture skipped: {}", e),
                ErrorType::Publish | ErrorType::Backend => warn!("Capture failed: {}", e),
            },
        }
    }

    /// Run until `shutdown` is cancelled or every notifier is dropped
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Capture loop started ({} backend)", self.backend.name());

        'outer: loop {
            let mut pending = tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = self.changes.changed() => match changed {
                    Ok(()) => self.changes.borrow_and_update().clone(),
                    Err(_) => {
                        debug!("All change notifiers dropped");
                        break;
                    }
                },
            };

            while let Some(change) = pending.take() {
                self.monitor.set_state(CaptureState::Capturing);

                let step = {
                    let capture = capture_change(
                        self.backend.as_ref(),
                        &self.store,
                        &self.limits,
                        &change,
                    );
                    tokio::pin!(capture);

                    tokio::select! {
                        _ = shutdown.cancelled() => Step::Shutdown,
                        changed = self.changes.changed() => match changed {
                            Ok(()) => Step::Superseded,
                            Err(_) => Step::Finished {
                                result: capture.await,
                                notifiers_gone: true,
                            },
                        },
                        result = &mut capture => Step::Finished {
                            result,
                            notifiers_gone: false,
                        },
                    }
                };

                match step {
                    Step::Shutdown => {
                        self.monitor.set_state(CaptureState::Idle);
                        break 'outer;
                    }
                    Step::Superseded => {
                        self.monitor.record_superseded();
                        debug!("Newer clipboard change arrived, restarting capture");
                        pending = self.changes.borrow_and_update().clone();
                    }
                    Step::Finished {
                        result,
                        notifiers_gone,
                    } => {
                        self.report(&result);
                        if notifiers_gone {
                            self.monitor.set_state(CaptureState::Idle);
                            break 'outer;
                        }
                    }
                }
            }

            self.monitor.set_state(CaptureState::Idle);
        }

        let stats = self.monitor.stats();
        info!(
            "Capture loop stopped (stored={}, promoted={}, unsupported={}, failed={}, superseded={})",
            stats.stored, stats.promoted, stats.unsupported, stats.failed, stats.superseded
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::backend::{MemoryClipboard, MockClipboardBackend};
    use crate::clipboard::error::ClipboardError;
    use crate::history::{ContentType, HistoryLimits};
    use bytes::Bytes;
    use std::time::Duration;

    fn text_change() -> ClipboardChange {
        ClipboardChange::new(vec!["text/plain".to_string()])
    }

    #[tokio::test]
    async fn test_capture_once_stores_and_promotes() {
        let clipboard = Arc::new(MemoryClipboard::new());
        clipboard.set_contents("text/plain", &b"hello"[..]);
        let store = Arc::new(HistoryStore::default());
        let (_notifier, rx) = ChangeNotifier::channel();

        let capture = CaptureLoop::new(clipboard.clone(), store.clone(), CaptureLimits::default(), rx);

        let first = capture.capture_once(&text_change()).await.unwrap();
        assert!(first.is_new());
        let second = capture.capture_once(&text_change()).await.unwrap();
        assert!(!second.is_new());
        assert_eq!(store.len(), 1);

        let stats = capture.monitor().stats();
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.promoted, 1);
    }

    #[tokio::test]
    async fn test_unsupported_change_is_counted_not_failed() {
        let mut backend = MockClipboardBackend::new();
        backend.expect_read().never();
        let store = Arc::new(HistoryStore::default());
        let (_notifier, rx) = ChangeNotifier::channel();

        let capture = CaptureLoop::new(Arc::new(backend), store.clone(), CaptureLimits::default(), rx);
        let change = ClipboardChange::new(vec!["text/html".into(), "application/x-custom".into()]);

        let err = capture.capture_once(&change).await.unwrap_err();
        assert!(matches!(err, ClipboardError::UnsupportedType(_)));
        assert!(store.is_empty());
        assert_eq!(capture.monitor().stats().unsupported, 1);
        assert_eq!(capture.monitor().stats().failed, 0);
    }

    #[tokio::test]
    async fn test_read_timeout_is_a_failure() {
        let clipboard = Arc::new(MemoryClipboard::new().with_read_delay(Duration::from_millis(200)));
        clipboard.set_contents("text/plain", &b"slow"[..]);
        let store = Arc::new(HistoryStore::default());
        let (_notifier, rx) = ChangeNotifier::channel();

        let limits = CaptureLimits {
            read_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let capture = CaptureLoop::new(clipboard, store.clone(), limits, rx);

        let err = capture.capture_once(&text_change()).await.unwrap_err();
        assert!(matches!(err, ClipboardError::ReadTimeout(20)));
        assert!(store.is_empty());
        assert_eq!(capture.monitor().stats().failed, 1);
    }

    #[tokio::test]
    async fn test_run_processes_notifications() {
        let clipboard = Arc::new(MemoryClipboard::new());
        let store = Arc::new(HistoryStore::default());
        let (notifier, rx) = ChangeNotifier::channel();
        let mut revisions = store.subscribe();

        let capture = CaptureLoop::new(clipboard.clone(), store.clone(), CaptureLimits::default(), rx);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(capture.run(shutdown.clone()));

        clipboard.set_contents("image/png", Bytes::from_static(&[0x89, b'P', b'N', b'G']));
        assert!(notifier.notify(ClipboardChange::new(vec!["image/png".into()])));

        tokio::time::timeout(Duration::from_secs(2), revisions.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.latest().unwrap().content_type, ContentType::Png);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_newer_change_supersedes_slow_read() {
        let clipboard = Arc::new(MemoryClipboard::new().with_read_delay(Duration::from_millis(100)));
        let store = Arc::new(HistoryStore::new(HistoryLimits::with_capacity(10)));
        let (notifier, rx) = ChangeNotifier::channel();
        let mut revisions = store.subscribe();

        let capture = CaptureLoop::new(clipboard.clone(), store.clone(), CaptureLimits::default(), rx);
        let monitor = capture.monitor();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(capture.run(shutdown.clone()));

        clipboard.set_contents("text/plain", &b"first"[..]);
        notifier.notify(text_change());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(monitor.state(), CaptureState::Capturing);

        clipboard.set_contents("text/plain", &b"second"[..]);
        notifier.notify(text_change());

        tokio::time::timeout(Duration::from_secs(2), revisions.changed())
            .await
            .unwrap()
            .unwrap();

        let entries = store.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.latest().unwrap().payload.as_ref(), b"second");
        assert_eq!(monitor.stats().superseded, 1);

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(monitor.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_run_stops_when_notifiers_dropped() {
        let store = Arc::new(HistoryStore::default());
        let (notifier, rx) = ChangeNotifier::channel();
        let capture = CaptureLoop::new(Arc::new(MemoryClipboard::new()), store, CaptureLimits::default(), rx);

        let handle = tokio::spawn(capture.run(CancellationToken::new()));
        drop(notifier);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
